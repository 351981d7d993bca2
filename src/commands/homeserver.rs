use std::io::Write;

use clap::Args;
use serde::Serialize;

use super::{Action, CommandError, Context};
use crate::api::Homeserver;
use crate::output;

#[derive(Args, Debug)]
pub struct HomeserverArgs {
    #[arg(short = 't', long = "token", help = "Include the access token")]
    include_token: bool,

    #[arg(short, long, help = "Really print the token")]
    force: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HomeserverInfo<'a> {
    home_server: &'a str,
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
}

impl Action for HomeserverArgs {
    async fn run<C: Homeserver>(
        self,
        ctx: &Context<C>,
        out: &mut dyn Write,
    ) -> Result<(), CommandError> {
        if self.include_token && !self.force {
            return Err(CommandError::usage(
                "the access token grants full control of this account; keep it secret and \
                 rerun with -f/--force to print it",
            ));
        }

        let session = ctx.session()?;
        let info = HomeserverInfo {
            home_server: ctx.client()?.homeserver().as_str(),
            user_id: &session.user_id,
            token: self.include_token.then_some(session.access_token.as_str()),
        };
        if ctx.json() {
            output::print_json(out, &info)?;
            return Ok(());
        }

        writeln!(out, "Home Server: {}", info.home_server)?;
        writeln!(out, "UserID     : {}", info.user_id)?;
        if let Some(token) = info.token {
            writeln!(out, "Token      : {token}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{context, run_action, StubHomeserver};
    use crate::commands::GlobalOptions;

    #[tokio::test]
    async fn prints_homeserver_and_user() {
        let ctx = context(GlobalOptions::default(), StubHomeserver::default());
        let args = HomeserverArgs {
            include_token: false,
            force: false,
        };

        let output = run_action(args, &ctx).await.expect("homeserver");
        assert_eq!(
            output,
            "Home Server: https://matrix.example.org/\nUserID     : @a:example.org\n"
        );
    }

    #[tokio::test]
    async fn token_needs_force() {
        let ctx = context(GlobalOptions::default(), StubHomeserver::default());
        let args = HomeserverArgs {
            include_token: true,
            force: false,
        };

        let error = run_action(args, &ctx).await.expect_err("no --force");
        assert!(matches!(error, CommandError::Usage(_)));
    }

    #[tokio::test]
    async fn forced_token_is_printed() {
        let options = GlobalOptions {
            json: true,
            ..GlobalOptions::default()
        };
        let ctx = context(options, StubHomeserver::default());
        let args = HomeserverArgs {
            include_token: true,
            force: true,
        };

        let output = run_action(args, &ctx).await.expect("homeserver");
        let value: serde_json::Value = serde_json::from_str(&output).expect("json");
        assert_eq!(value["homeServer"], "https://matrix.example.org/");
        assert_eq!(value["token"], "token");
    }
}

use std::io::Write;

use clap::Args;

use super::{Action, CommandError, Context};
use crate::api::Homeserver;
use crate::session::SessionStore;

#[derive(Args, Debug)]
pub struct LogoutArgs {
    #[arg(short, long, help = "Perform the logout")]
    force: bool,
}

impl Action for LogoutArgs {
    async fn run<C: Homeserver>(
        self,
        ctx: &Context<C>,
        out: &mut dyn Write,
    ) -> Result<(), CommandError> {
        if !self.force {
            return Err(CommandError::usage(
                "logout invalidates the stored access token and removes the session; rerun with --force",
            ));
        }

        ctx.client()?.logout().await?;
        SessionStore::new(ctx.config.session_path.clone()).clear()?;
        writeln!(out, "Logged out.")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{context, run_action, StubHomeserver};
    use crate::commands::GlobalOptions;
    use serde_json::json;

    #[tokio::test]
    async fn refuses_without_force() {
        let ctx = context(GlobalOptions::default(), StubHomeserver::default());

        let error = run_action(LogoutArgs { force: false }, &ctx)
            .await
            .expect_err("needs --force");
        assert!(matches!(error, CommandError::Usage(_)));
        assert!(ctx.client().expect("client").requests.borrow().is_empty());
    }

    #[tokio::test]
    async fn logs_out_with_force() {
        let stub = StubHomeserver::default().with("_matrix/client/v3/logout", json!({}));
        let ctx = context(GlobalOptions::default(), stub);

        let output = run_action(LogoutArgs { force: true }, &ctx).await.expect("logout");
        assert_eq!(output, "Logged out.\n");
    }
}

use std::io::{self, BufRead, IsTerminal, Write};

use clap::Args;
use dialoguer::Password;
use reqwest::Client;
use serde_json::json;

use super::{Action, CommandError, Context};
use crate::api::{self, Homeserver, MatrixClient};
use crate::discovery::DiscoveryResolver;
use crate::output;
use crate::session::{Session, SessionStore};
use crate::user_id::UserId;

#[derive(Args, Debug, Default)]
pub struct LoginArgs {
    #[arg(short, long, help = "Password to log in with; prompted for if omitted")]
    password: Option<String>,

    #[arg(short, long, help = "Display name of the new device")]
    device_name: Option<String>,
}

impl Action for LoginArgs {
    // There is nothing to load yet; this command is what creates the session.
    const REQUIRES_SESSION: bool = false;

    async fn run<C: Homeserver>(
        self,
        ctx: &Context<C>,
        out: &mut dyn Write,
    ) -> Result<(), CommandError> {
        let user = ctx.target_user()?;
        let http = api::http_client(&ctx.config)?;
        let resolver = DiscoveryResolver::new(http.clone());
        self.login(ctx, &user, &resolver, http, out).await
    }
}

impl LoginArgs {
    async fn login<C>(
        self,
        ctx: &Context<C>,
        user: &UserId,
        resolver: &DiscoveryResolver,
        http: Client,
        out: &mut dyn Write,
    ) -> Result<(), CommandError> {
        let discovered = resolver.resolve(user).await?;

        let password = match self.password {
            Some(password) => password,
            None => read_password(user)?,
        };
        if password.is_empty() {
            return Err(CommandError::usage("empty password"));
        }
        let device_name = self
            .device_name
            .unwrap_or_else(|| ctx.config.device_display_name());

        let client = MatrixClient::new(http, discovered.homeserver.clone());
        let login = client.login(user, &password, &device_name).await?;

        let session = Session {
            user_id: login.user_id,
            access_token: login.access_token,
            device_id: login.device_id,
        };
        let store = SessionStore::new(ctx.config.session_path.clone());
        store.store(&session)?;
        tracing::info!(path = %store.path().display(), "stored session");

        if ctx.json() {
            output::print_json(
                out,
                &json!({
                    "userId": session.user_id,
                    "deviceId": session.device_id,
                    "homeserver": discovered.homeserver,
                }),
            )?;
            return Ok(());
        }

        match session.device_id.as_deref() {
            Some(device_id) => writeln!(out, "Logged in as {} (device {device_id}).", session.user_id)?,
            None => writeln!(out, "Logged in as {}.", session.user_id)?,
        }
        Ok(())
    }
}

fn read_password(user: &UserId) -> Result<String, CommandError> {
    if io::stdin().is_terminal() {
        return Ok(Password::new()
            .with_prompt(format!("Password for {user}"))
            .interact()?);
    }
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{config, run_action, StubHomeserver};
    use crate::commands::GlobalOptions;
    use crate::user_id::UserIdError;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn does_not_require_a_session() {
        assert!(!<LoginArgs as Action>::REQUIRES_SESSION);
    }

    #[tokio::test]
    async fn requires_a_valid_user() {
        let options = GlobalOptions {
            user_id: Some("@alice".to_string()),
            ..GlobalOptions::default()
        };
        let ctx = Context::<StubHomeserver>::new(options, config());

        let error = run_action(LoginArgs::default(), &ctx).await.expect_err("bad -U");
        assert!(matches!(error, CommandError::UserId(UserIdError::MissingServerName(_))));
    }

    /// Serves both the well-known document and the homeserver itself.
    async fn homeserver() -> (MockServer, UserId) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/matrix/client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "m.homeserver": { "base_url": server.uri() }
            })))
            .expect(1)
            .mount(&server)
            .await;
        let user = UserId::parse(&format!("@alice:{}", server.address())).expect("user id");
        (server, user)
    }

    async fn login_in(
        dir: &tempfile::TempDir,
        options: GlobalOptions,
        user: &UserId,
        args: LoginArgs,
    ) -> Result<String, CommandError> {
        let mut config = config();
        config.session_path = dir.path().join("mnotify").join("config.json");
        let ctx = Context::<StubHomeserver>::new(options, config);
        let mut out = Vec::new();
        args.login(&ctx, user, &DiscoveryResolver::plain_http(Client::new()), Client::new(), &mut out)
            .await?;
        Ok(String::from_utf8(out).expect("utf8"))
    }

    #[tokio::test]
    async fn password_login_stores_returned_session() {
        let (server, user) = homeserver().await;
        Mock::given(method("POST"))
            .and(path("/_matrix/client/v3/login"))
            .and(body_json(json!({
                "type": "m.login.password",
                "identifier": { "type": "m.id.user", "user": user.as_str() },
                "password": "hunter2",
                "initial_device_display_name": "laptop"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user_id": user.as_str(),
                "access_token": "syt_fresh",
                "device_id": "DEV1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let args = LoginArgs {
            password: Some("hunter2".to_string()),
            device_name: Some("laptop".to_string()),
        };
        let output = login_in(&dir, GlobalOptions::default(), &user, args)
            .await
            .expect("login");
        assert_eq!(output, format!("Logged in as {user} (device DEV1).\n"));

        let stored = SessionStore::new(dir.path().join("mnotify").join("config.json"))
            .load()
            .expect("stored session");
        assert_eq!(
            stored,
            Session {
                user_id: user.to_string(),
                access_token: "syt_fresh".to_string(),
                device_id: Some("DEV1".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn rejected_password_stores_nothing() {
        let (server, user) = homeserver().await;
        Mock::given(method("POST"))
            .and(path("/_matrix/client/v3/login"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "errcode": "M_FORBIDDEN",
                "error": "Invalid password"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let args = LoginArgs {
            password: Some("wrong".to_string()),
            device_name: None,
        };
        let error = login_in(&dir, GlobalOptions::default(), &user, args)
            .await
            .expect_err("forbidden");
        assert!(matches!(error, CommandError::Api(_)));
        assert!(!dir.path().join("mnotify").join("config.json").exists());
    }

    #[tokio::test]
    async fn json_output_names_the_homeserver() {
        let (server, user) = homeserver().await;
        Mock::given(method("POST"))
            .and(path("/_matrix/client/v3/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user_id": user.as_str(),
                "access_token": "syt_fresh"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let options = GlobalOptions {
            json: true,
            ..GlobalOptions::default()
        };
        let args = LoginArgs {
            password: Some("hunter2".to_string()),
            device_name: None,
        };
        let output = login_in(&dir, options, &user, args).await.expect("login");
        let value: serde_json::Value = serde_json::from_str(&output).expect("json");
        assert_eq!(value["userId"], user.as_str());
        assert!(value["deviceId"].is_null());
        assert_eq!(value["homeserver"], format!("{}/", server.uri()));
    }

    #[tokio::test]
    async fn empty_password_is_refused_before_login() {
        let (_server, user) = homeserver().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let args = LoginArgs {
            password: Some(String::new()),
            device_name: None,
        };

        let error = login_in(&dir, GlobalOptions::default(), &user, args)
            .await
            .expect_err("empty password");
        assert!(matches!(error, CommandError::Usage(_)));
    }
}

use std::io::Write;

use clap::Args;

use super::{Action, CommandError, Context};
use crate::api::Homeserver;

#[derive(Args, Debug)]
pub struct TypingArgs {
    #[arg(long, help = "Stop the typing notification")]
    disable: bool,

    #[arg(short, long, default_value_t = 30000, help = "How long the notification lasts in ms")]
    timeout: u64,
}

impl Action for TypingArgs {
    async fn run<C: Homeserver>(
        self,
        ctx: &Context<C>,
        _out: &mut dyn Write,
    ) -> Result<(), CommandError> {
        let room_id = ctx.room_id()?;
        let user_id = &ctx.session()?.user_id;
        ctx.client()?
            .typing(room_id, user_id, !self.disable, self.timeout)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{context, run_action, StubHomeserver};
    use crate::commands::GlobalOptions;
    use serde_json::json;

    const TYPING: &str = "_matrix/client/v3/rooms/!r:example.org/typing/@a:example.org";

    fn in_room() -> GlobalOptions {
        GlobalOptions {
            room_id: Some("!r:example.org".to_string()),
            ..GlobalOptions::default()
        }
    }

    #[tokio::test]
    async fn starts_typing_as_session_user() {
        let ctx = context(in_room(), StubHomeserver::default().with(TYPING, json!({})));
        let args = TypingArgs {
            disable: false,
            timeout: 5000,
        };

        let output = run_action(args, &ctx).await.expect("typing");
        assert!(output.is_empty());
        let requests = ctx.client().expect("client").requests.borrow();
        assert_eq!(requests[0].body, Some(json!({ "typing": true, "timeout": 5000 })));
    }

    #[tokio::test]
    async fn disable_stops_typing() {
        let ctx = context(in_room(), StubHomeserver::default().with(TYPING, json!({})));
        let args = TypingArgs {
            disable: true,
            timeout: 30000,
        };

        run_action(args, &ctx).await.expect("typing");
        let requests = ctx.client().expect("client").requests.borrow();
        assert_eq!(requests[0].body, Some(json!({ "typing": false })));
    }
}

use std::io::{self, Read, Write};

use clap::Args;
use serde_json::{json, Value};

use super::{transaction_id, Action, CommandError, Context};
use crate::api::Homeserver;
use crate::output;

#[derive(Args, Debug, Default)]
pub struct SendArgs {
    #[arg(short, long, help = "Send this message instead of stdin")]
    message: Option<String>,

    #[arg(short, long, help = "Send a notice message")]
    notice: bool,

    #[arg(short, long, conflicts_with = "notice", help = "Send an emote message")]
    emote: bool,

    #[arg(long, conflicts_with_all = ["notice", "emote"], help = "Reply to a specific event id")]
    reply_to: Option<String>,
}

impl SendArgs {
    fn msgtype(&self) -> &'static str {
        if self.notice {
            "m.notice"
        } else if self.emote {
            "m.emote"
        } else {
            "m.text"
        }
    }

    fn content(&self, body: &str) -> Value {
        let mut content = json!({ "msgtype": self.msgtype(), "body": body });
        if let Some(event_id) = self.reply_to.as_deref() {
            content["m.relates_to"] = json!({ "m.in_reply_to": { "event_id": event_id } });
        }
        content
    }
}

impl Action for SendArgs {
    async fn run<C: Homeserver>(
        self,
        ctx: &Context<C>,
        out: &mut dyn Write,
    ) -> Result<(), CommandError> {
        let room_id = ctx.room_id()?;
        let raw = match self.message.as_deref() {
            Some(message) => message.to_string(),
            None => read_stdin()?,
        };
        let content = self.content(message_body(&raw)?);

        let event_id = ctx
            .client()?
            .send_message(room_id, &transaction_id(), content)
            .await?;
        if ctx.json() {
            output::print_json(out, &json!({ "roomId": room_id, "eventId": event_id }))?;
        } else {
            writeln!(out, "{event_id}")?;
        }
        Ok(())
    }
}

fn read_stdin() -> Result<String, CommandError> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn message_body(raw: &str) -> Result<&str, CommandError> {
    let body = raw.trim_end_matches(['\r', '\n']);
    if body.trim().is_empty() {
        return Err(CommandError::usage("refusing to send an empty message"));
    }
    Ok(body)
}

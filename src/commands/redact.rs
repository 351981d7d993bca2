use std::io::Write;

use clap::Args;
use serde_json::json;

use super::{transaction_id, Action, CommandError, Context};
use crate::api::Homeserver;
use crate::output;

#[derive(Args, Debug)]
pub struct RedactArgs {
    #[arg(short, long, help = "The event to redact")]
    event: String,

    #[arg(long, help = "Reason shown to other room members")]
    reason: Option<String>,
}

impl Action for RedactArgs {
    async fn run<C: Homeserver>(
        self,
        ctx: &Context<C>,
        out: &mut dyn Write,
    ) -> Result<(), CommandError> {
        let room_id = ctx.room_id()?;
        let event_id = self.event.trim();
        if event_id.is_empty() {
            return Err(CommandError::usage("no event given, use -e/--event"));
        }

        let redaction = ctx
            .client()?
            .redact(room_id, event_id, &transaction_id(), self.reason.as_deref())
            .await?;
        if ctx.json() {
            output::print_json(out, &json!({ "roomId": room_id, "eventId": redaction }))?;
        } else {
            writeln!(out, "{redaction}")?;
        }
        Ok(())
    }
}

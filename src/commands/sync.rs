use std::io::Write;

use clap::Args;

use super::{Action, CommandError, Context};
use crate::api::{Homeserver, Presence, RoomEvent, SyncResponse};
use crate::dates;
use crate::output;

#[derive(Args, Debug)]
pub struct SyncArgs {
    #[arg(short, long, help = "Set presence to online")]
    presence: bool,

    #[arg(short, long = "timeout", default_value_t = 30000, help = "Matrix sync timeout in ms")]
    timeout: u64,
}

impl Action for SyncArgs {
    async fn run<C: Homeserver>(
        self,
        ctx: &Context<C>,
        out: &mut dyn Write,
    ) -> Result<(), CommandError> {
        let client = ctx.client()?;
        let presence = if self.presence {
            Presence::Online
        } else {
            Presence::Offline
        };

        let mut since: Option<String> = None;
        loop {
            let batch = client.sync(since.as_deref(), self.timeout, presence).await?;
            tracing::debug!(next_batch = %batch.next_batch, "sync batch");
            print_batch(ctx, out, &batch)?;
            out.flush()?;
            since = Some(batch.next_batch);
        }
    }
}

fn print_batch<C>(ctx: &Context<C>, out: &mut dyn Write, batch: &SyncResponse) -> Result<(), CommandError> {
    for room_id in batch.rooms.invite.keys() {
        if ctx.json() {
            output::print_json_line(out, &serde_json::json!({ "type": "invite", "room_id": room_id }))?;
        } else {
            writeln!(out, "invited to {room_id}")?;
        }
    }

    for (room_id, room) in &batch.rooms.join {
        for event in &room.timeline.events {
            if ctx.json() {
                let mut event = event.clone();
                event.room_id = Some(room_id.clone());
                output::print_json_line(out, &event)?;
            } else {
                writeln!(out, "{}", event_line(room_id, event))?;
            }
        }
    }
    Ok(())
}

fn event_line(room_id: &str, event: &RoomEvent) -> String {
    let text = event
        .body()
        .map(output::single_line)
        .unwrap_or_else(|| format!("<{}>", event.kind));
    format!(
        "{} {} {}: {}",
        dates::format_timestamp(event.origin_server_ts),
        room_id,
        event.sender,
        text
    )
}

use std::io::Write;

use clap::Args;

use super::{Action, CommandError, Context};
use crate::api::Homeserver;
use crate::output;

#[derive(Args, Debug)]
pub struct WhoamiArgs {}

impl Action for WhoamiArgs {
    async fn run<C: Homeserver>(
        self,
        ctx: &Context<C>,
        out: &mut dyn Write,
    ) -> Result<(), CommandError> {
        let whoami = ctx.client()?.whoami().await?;
        if ctx.json() {
            output::print_json(out, &whoami)?;
            return Ok(());
        }

        writeln!(out, "UserID  : {}", whoami.user_id)?;
        if let Some(device_id) = whoami.device_id.as_deref().filter(|id| !id.is_empty()) {
            writeln!(out, "DeviceID: {device_id}")?;
        }
        Ok(())
    }
}

use std::io::Write;

use clap::Args;

use super::{Action, CommandError, Context};
use crate::api::Homeserver;
use crate::output;

#[derive(Args, Debug)]
pub struct VersionArgs {}

impl Action for VersionArgs {
    async fn run<C: Homeserver>(
        self,
        ctx: &Context<C>,
        out: &mut dyn Write,
    ) -> Result<(), CommandError> {
        let versions = ctx.client()?.versions().await?;
        if ctx.json() {
            output::print_json(out, &versions)?;
            return Ok(());
        }

        writeln!(out, "Protocol Versions: [{}]", versions.versions.join(" "))?;
        writeln!(out, "Unstable Features:")?;
        for (name, enabled) in &versions.unstable_features {
            writeln!(out, "  {name}: {enabled}")?;
        }
        Ok(())
    }
}

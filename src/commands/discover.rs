use std::io::Write;

use clap::Args;

use super::{Action, CommandError, Context};
use crate::api::{self, Homeserver};
use crate::discovery::DiscoveryResolver;
use crate::output;

#[derive(Args, Debug)]
pub struct DiscoverArgs {}

impl Action for DiscoverArgs {
    async fn run<C: Homeserver>(
        self,
        ctx: &Context<C>,
        out: &mut dyn Write,
    ) -> Result<(), CommandError> {
        let resolver = DiscoveryResolver::new(api::http_client(&ctx.config)?);
        discover(ctx, &resolver, out).await
    }
}

async fn discover<C>(
    ctx: &Context<C>,
    resolver: &DiscoveryResolver,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    let user = ctx.target_user()?;
    let discovered = resolver.resolve(&user).await?;
    if ctx.json() {
        output::print_json(out, &discovered)?;
        return Ok(());
    }

    writeln!(out, "Home Server: {}", discovered.homeserver)?;
    if let Some(identity_server) = &discovered.identity_server {
        writeln!(out, "Identity Server: {identity_server}")?;
    }
    Ok(())
}

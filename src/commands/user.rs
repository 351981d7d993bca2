use std::io::Write;

use clap::Args;
use serde::Serialize;

use super::{Action, CommandError, Context};
use crate::api::Homeserver;
use crate::output;

#[derive(Args, Debug)]
pub struct UserArgs {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserProfile {
    user_id: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
}

impl Action for UserArgs {
    async fn run<C: Homeserver>(
        self,
        ctx: &Context<C>,
        out: &mut dyn Write,
    ) -> Result<(), CommandError> {
        let user_id = ctx.target_user_or_self()?;
        let profile = ctx.client()?.profile(&user_id).await?;
        let profile = UserProfile {
            user_id,
            display_name: profile.displayname,
            avatar_url: profile.avatar_url,
        };

        if ctx.json() {
            output::print_json(out, &profile)?;
            return Ok(());
        }

        writeln!(out, "UserID     : {}", profile.user_id)?;
        writeln!(out, "DisplayName: {}", profile.display_name.as_deref().unwrap_or("-"))?;
        writeln!(out, "AvatarURL  : {}", profile.avatar_url.as_deref().unwrap_or("-"))?;
        Ok(())
    }
}

//! Synapse admin API commands. These need a session with server admin rights.

use std::io::Write;

use clap::{Args, Subcommand};

use super::{Action, CommandError, Context};
use crate::api::{Homeserver, WhoisResponse};
use crate::dates;
use crate::output::{self, Column};

#[derive(Subcommand, Debug)]
pub enum SynapseCommand {
    /// Inspect rooms on the server
    Room(SynapseRoomArgs),
    /// Inspect a user account
    User(SynapseUserArgs),
    /// Print the server version
    Version(SynapseVersionArgs),
}

#[derive(Args, Debug)]
pub struct SynapseRoomArgs {
    #[arg(short, long, help = "List all rooms on the server")]
    list: bool,

    #[arg(short, long, help = "List the members of the -R room")]
    members: bool,
}

#[derive(Args, Debug)]
pub struct SynapseUserArgs {
    #[arg(short, long, help = "List the user's devices")]
    devices: bool,

    #[arg(short, long, help = "Show the user's account details")]
    show: bool,

    #[arg(short, long, help = "Show the user's active connections")]
    whois: bool,
}

#[derive(Args, Debug)]
pub struct SynapseVersionArgs {}

impl Action for SynapseCommand {
    async fn run<C: Homeserver>(
        self,
        ctx: &Context<C>,
        out: &mut dyn Write,
    ) -> Result<(), CommandError> {
        match self {
            SynapseCommand::Room(args) => args.run(ctx, out).await,
            SynapseCommand::User(args) => args.run(ctx, out).await,
            SynapseCommand::Version(args) => args.run(ctx, out).await,
        }
    }
}

impl Action for SynapseRoomArgs {
    async fn run<C: Homeserver>(
        self,
        ctx: &Context<C>,
        out: &mut dyn Write,
    ) -> Result<(), CommandError> {
        let client = ctx.client()?;

        if self.list {
            let list = client.admin_rooms().await?;
            if ctx.json() {
                output::print_json(out, &list)?;
                return Ok(());
            }
            let columns = [
                Column::new("room", 48),
                Column::new("name", 32),
                Column::new("alias", 32),
                Column::new("members", 8),
            ];
            let rows: Vec<Vec<String>> = list
                .rooms
                .iter()
                .map(|room| {
                    vec![
                        room.room_id.clone(),
                        room.name.clone().unwrap_or_else(|| "-".to_string()),
                        room.canonical_alias.clone().unwrap_or_else(|| "-".to_string()),
                        room.joined_members.to_string(),
                    ]
                })
                .collect();
            output::print_table(out, &columns, &rows)?;
            return Ok(());
        }

        if self.members {
            let members = client.admin_room_members(ctx.room_id()?).await?;
            if ctx.json() {
                output::print_json(out, &members)?;
                return Ok(());
            }
            for member in &members.members {
                writeln!(out, "{member}")?;
            }
            return Ok(());
        }

        Err(CommandError::usage("no room action given, use --list or --members"))
    }
}

impl Action for SynapseUserArgs {
    async fn run<C: Homeserver>(
        self,
        ctx: &Context<C>,
        out: &mut dyn Write,
    ) -> Result<(), CommandError> {
        let client = ctx.client()?;
        let user_id = ctx.target_user_or_self()?;

        if self.show {
            let account = client.admin_user(&user_id).await?;
            output::print_json(out, &account)?;
            return Ok(());
        }

        if self.devices {
            let devices = client.admin_user_devices(&user_id).await?;
            if ctx.json() {
                output::print_json(out, &devices)?;
                return Ok(());
            }
            let columns = [
                Column::new("device", 16),
                Column::new("name", 32),
                Column::new("ip", 40),
                Column::new("last seen", 19),
            ];
            let rows: Vec<Vec<String>> = devices
                .devices
                .iter()
                .map(|device| {
                    vec![
                        device.device_id.clone(),
                        device.display_name.clone().unwrap_or_else(|| "-".to_string()),
                        device.last_seen_ip.clone().unwrap_or_else(|| "-".to_string()),
                        dates::format_timestamp(device.last_seen_ts.unwrap_or_default()),
                    ]
                })
                .collect();
            output::print_table(out, &columns, &rows)?;
            return Ok(());
        }

        if self.whois {
            let whois = client.admin_whois(&user_id).await?;
            if ctx.json() {
                output::print_json(out, &whois)?;
                return Ok(());
            }
            print_whois(out, &whois)?;
            return Ok(());
        }

        Err(CommandError::usage("no user action given, use --show, --devices or --whois"))
    }
}

fn print_whois(out: &mut dyn Write, whois: &WhoisResponse) -> Result<(), CommandError> {
    writeln!(out, "UserID: {}", whois.user_id)?;
    for (device_id, device) in &whois.devices {
        for connection in device.sessions.iter().flat_map(|session| &session.connections) {
            writeln!(
                out,
                "  {} {} {} {}",
                if device_id.is_empty() { "-" } else { device_id },
                connection.ip.as_deref().unwrap_or("-"),
                dates::format_timestamp(connection.last_seen.unwrap_or_default()),
                connection.user_agent.as_deref().unwrap_or("-"),
            )?;
        }
    }
    Ok(())
}

impl Action for SynapseVersionArgs {
    async fn run<C: Homeserver>(
        self,
        ctx: &Context<C>,
        out: &mut dyn Write,
    ) -> Result<(), CommandError> {
        let version = ctx.client()?.admin_server_version().await?;
        if ctx.json() {
            output::print_json(out, &version)?;
        } else {
            writeln!(out, "Server Version: {}", version.server_version)?;
        }
        Ok(())
    }
}

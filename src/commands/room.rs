use std::io::Write;

use clap::{Args, ValueEnum};
use serde::Serialize;
use serde_json::json;

use super::{Action, CommandError, Context};
use crate::api::{CreateRoomInput, Homeserver, RoomEvent, RoomMember};
use crate::dates;
use crate::output::{self, Column};
use crate::user_id::UserId;

#[derive(Args, Debug)]
pub struct RoomArgs {
    #[arg(short, long, help = "Create a new room")]
    create: bool,

    #[arg(short, long, help = "Create a direct room")]
    direct: bool,

    #[arg(long, value_enum, default_value_t = RoomProfile::TrustedPrivate, help = "The room profile")]
    profile: RoomProfile,

    #[arg(short, long, help = "Invite a user to a room")]
    invite: bool,

    #[arg(long, value_delimiter = ',', help = "A list of users to invite to a room")]
    invites: Vec<String>,

    #[arg(long, help = "Include room members")]
    members: bool,

    #[arg(short, long, help = "List the user's rooms")]
    list: bool,

    #[arg(long, help = "Leave a room")]
    leave: bool,

    #[arg(long, help = "Forget about a room")]
    forget: bool,

    #[arg(long, help = "Join a room")]
    join: bool,

    #[arg(short, long, help = "List messages of a room")]
    messages: bool,

    #[arg(short, long, default_value_t = 10, help = "Number of messages to list")]
    number: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RoomProfile {
    #[value(name = "trusted_private")]
    TrustedPrivate,
    #[value(name = "private")]
    Private,
    #[value(name = "public")]
    Public,
}

impl RoomProfile {
    fn preset(self) -> &'static str {
        match self {
            RoomProfile::TrustedPrivate => "trusted_private_chat",
            RoomProfile::Private => "private_chat",
            RoomProfile::Public => "public_chat",
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomSummary {
    room_id: String,
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    members: Option<Vec<MemberSummary>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MemberSummary {
    user_id: String,
    display_name: Option<String>,
}

impl Action for RoomArgs {
    async fn run<C: Homeserver>(
        self,
        ctx: &Context<C>,
        out: &mut dyn Write,
    ) -> Result<(), CommandError> {
        let client = ctx.client()?;

        if self.create {
            let invite = self
                .invites
                .iter()
                .map(|user| UserId::parse(user).map(|user| user.to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            let input = CreateRoomInput {
                preset: self.profile.preset(),
                is_direct: self.direct,
                invite,
            };
            let room_id = client.create_room(&input).await?;
            return print_room_id(ctx, out, &room_id);
        }

        if self.join {
            let room_id = client.join_room(ctx.room_id()?).await?;
            return print_room_id(ctx, out, &room_id);
        }

        if self.invite {
            let room_id = ctx.room_id()?;
            let user = ctx.target_user()?;
            client.invite(room_id, user.as_str()).await?;
            if !ctx.json() {
                writeln!(out, "Invited {user} to {room_id}.")?;
            }
            return Ok(());
        }

        if self.leave {
            let room_id = ctx.room_id()?;
            client.leave(room_id).await?;
            if !ctx.json() {
                writeln!(out, "Left {room_id}.")?;
            }
            return Ok(());
        }

        if self.forget {
            let room_id = ctx.room_id()?;
            client.forget(room_id).await?;
            if !ctx.json() {
                writeln!(out, "Forgot {room_id}.")?;
            }
            return Ok(());
        }

        if self.messages {
            let mut events = client.messages(ctx.room_id()?, self.number).await?;
            events.reverse();
            return print_messages(ctx, out, &events);
        }

        if self.list {
            let mut rooms = Vec::new();
            for room_id in client.joined_rooms().await? {
                let name = client.room_name(&room_id).await?;
                let members = if self.members {
                    Some(member_summaries(client.joined_members(&room_id).await?))
                } else {
                    None
                };
                rooms.push(RoomSummary {
                    room_id,
                    name,
                    members,
                });
            }
            return print_rooms(ctx, out, &rooms);
        }

        Err(CommandError::usage(
            "no room action given, use one of --create, --join, --invite, --leave, --forget, --messages, --list",
        ))
    }
}

fn member_summaries(members: impl IntoIterator<Item = (String, RoomMember)>) -> Vec<MemberSummary> {
    members
        .into_iter()
        .map(|(user_id, member)| MemberSummary {
            user_id,
            display_name: member.display_name,
        })
        .collect()
}

fn print_room_id<C>(ctx: &Context<C>, out: &mut dyn Write, room_id: &str) -> Result<(), CommandError> {
    if ctx.json() {
        output::print_json(out, &json!({ "roomId": room_id }))?;
    } else {
        writeln!(out, "{room_id}")?;
    }
    Ok(())
}

fn print_messages<C>(ctx: &Context<C>, out: &mut dyn Write, events: &[RoomEvent]) -> Result<(), CommandError> {
    if ctx.json() {
        output::print_json(out, events)?;
        return Ok(());
    }

    let now = dates::now_millis();
    let rows: Vec<Vec<String>> = events
        .iter()
        .map(|event| {
            vec![
                dates::format_relative_date(event.origin_server_ts, now),
                event.sender.clone(),
                event
                    .body()
                    .map(output::single_line)
                    .unwrap_or_else(|| format!("<{}>", event.kind)),
            ]
        })
        .collect();
    let columns = [
        Column::new("when", 10),
        Column::new("from", 32),
        Column::new("text", 72),
    ];
    output::print_table(out, &columns, &rows)?;
    Ok(())
}

fn print_rooms<C>(ctx: &Context<C>, out: &mut dyn Write, rooms: &[RoomSummary]) -> Result<(), CommandError> {
    if ctx.json() {
        output::print_json(out, rooms)?;
        return Ok(());
    }

    let with_members = rooms.iter().any(|room| room.members.is_some());
    let rows: Vec<Vec<String>> = rooms
        .iter()
        .map(|room| {
            let mut row = vec![
                room.room_id.clone(),
                room.name.clone().unwrap_or_else(|| "-".to_string()),
            ];
            if let Some(members) = &room.members {
                let names: Vec<&str> = members.iter().map(|member| member.user_id.as_str()).collect();
                row.push(names.join(", "));
            }
            row
        })
        .collect();

    let mut columns = vec![Column::new("room", 48), Column::new("name", 32)];
    if with_members {
        columns.push(Column::new("members", 72));
    }
    output::print_table(out, &columns, &rows)?;
    Ok(())
}

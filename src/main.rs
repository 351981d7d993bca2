mod api;
mod bootstrap;
mod commands;
mod config;
mod dates;
mod discovery;
mod dispatch;
mod logging;
mod output;
mod session;
mod user_id;

use std::io::{self, Write};

use clap::{Parser, Subcommand};

use crate::bootstrap::SessionBootstrap;
use crate::commands::discover::DiscoverArgs;
use crate::commands::homeserver::HomeserverArgs;
use crate::commands::login::LoginArgs;
use crate::commands::logout::LogoutArgs;
use crate::commands::redact::RedactArgs;
use crate::commands::room::RoomArgs;
use crate::commands::send::SendArgs;
use crate::commands::synapse::SynapseCommand;
use crate::commands::sync::SyncArgs;
use crate::commands::typing::TypingArgs;
use crate::commands::user::UserArgs;
use crate::commands::version::VersionArgs;
use crate::commands::whoami::WhoamiArgs;
use crate::commands::GlobalOptions;
use crate::config::Config;
use crate::dispatch::{DispatchError, Dispatcher};

#[derive(Parser)]
#[command(
    name = "mnotify",
    version,
    about = "A command line client for Matrix",
    after_help = "Examples:\n  mnotify login -U @alice:example.org\n  mnotify whoami\n  mnotify room --list --members\n  mnotify room --create --invites @bob:example.org\n  echo hello | mnotify send -R '!room:example.org'\n  mnotify sync --presence --json\n  mnotify synapse user --whois -U @bob:example.org"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short = 'U', long = "user", global = true, help = "Specify the full matrix user id")]
    user: Option<String>,

    #[arg(short = 'R', long = "room", global = true, help = "Specify a room to operate on")]
    room: Option<String>,

    #[arg(short = 'J', long, global = true, help = "Output JSON if supported")]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Perform a .well-known client discovery")]
    Discover(DiscoverArgs),
    #[command(about = "Show the homeserver and login of this session", visible_alias = "hs")]
    Homeserver(HomeserverArgs),
    #[command(about = "Log in and store the session")]
    Login(LoginArgs),
    #[command(about = "Logout with this session")]
    Logout(LogoutArgs),
    #[command(about = "Redact an event in a room")]
    Redact(RedactArgs),
    #[command(about = "Interact with matrix rooms (create, join, invite, ...)")]
    Room(RoomArgs),
    #[command(about = "Send messages to a room")]
    Send(SendArgs),
    #[command(about = "Use the synapse admin api")]
    Synapse {
        #[command(subcommand)]
        command: SynapseCommand,
    },
    #[command(about = "Stream matrix events to the terminal")]
    Sync(SyncArgs),
    #[command(about = "Send typing notifications to a room")]
    Typing(TypingArgs),
    #[command(about = "View user profile data (avatar, display name, ...)")]
    User(UserArgs),
    #[command(about = "Ask the homeserver about supported protocol versions")]
    Version(VersionArgs),
    #[command(about = "Identify this login")]
    Whoami(WhoamiArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    logging::init();
    let cli = Cli::parse();

    if let Err(error) = run(cli).await {
        eprintln!("{error}");
        if let Some(hint) = error.hint() {
            eprintln!("{hint}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), DispatchError> {
    let options = GlobalOptions {
        room_id: cli.room,
        user_id: cli.user,
        json: cli.json,
    };
    let config = Config::load();
    tracing::debug!(session = %config.session_path.display(), "loaded configuration");

    let bootstrap = SessionBootstrap::new(&config);
    let dispatcher = Dispatcher::new(options, config, bootstrap);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = match cli.command {
        Command::Discover(args) => dispatcher.dispatch(args, &mut out).await,
        Command::Homeserver(args) => dispatcher.dispatch(args, &mut out).await,
        Command::Login(args) => dispatcher.dispatch(args, &mut out).await,
        Command::Logout(args) => dispatcher.dispatch(args, &mut out).await,
        Command::Redact(args) => dispatcher.dispatch(args, &mut out).await,
        Command::Room(args) => dispatcher.dispatch(args, &mut out).await,
        Command::Send(args) => dispatcher.dispatch(args, &mut out).await,
        Command::Synapse { command } => dispatcher.dispatch(command, &mut out).await,
        Command::Sync(args) => dispatcher.dispatch(args, &mut out).await,
        Command::Typing(args) => dispatcher.dispatch(args, &mut out).await,
        Command::User(args) => dispatcher.dispatch(args, &mut out).await,
        Command::Version(args) => dispatcher.dispatch(args, &mut out).await,
        Command::Whoami(args) => dispatcher.dispatch(args, &mut out).await,
    };
    out.flush().map_err(commands::CommandError::from)?;
    result
}

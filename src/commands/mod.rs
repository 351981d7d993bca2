//! Leaf commands and the context they run in.

use std::io::{self, Write};

use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

use crate::api::{ApiError, Homeserver};
use crate::config::Config;
use crate::dates;
use crate::discovery::DiscoveryError;
use crate::output::OutputError;
use crate::session::{ConfigError, Session};
use crate::user_id::{UserId, UserIdError};

pub mod discover;
pub mod homeserver;
pub mod login;
pub mod logout;
pub mod redact;
pub mod room;
pub mod send;
pub mod synapse;
pub mod sync;
pub mod typing;
pub mod user;
pub mod version;
pub mod whoami;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    UserId(#[from] UserIdError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Session(#[from] ConfigError),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("could not build http client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
    #[error("{0}")]
    Usage(String),
    #[error("no session available for this command")]
    NoSession,
}

impl CommandError {
    pub fn usage(message: impl Into<String>) -> Self {
        CommandError::Usage(message.into())
    }
}

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub room_id: Option<String>,
    pub user_id: Option<String>,
    pub json: bool,
}

/// Everything a leaf command may read: flags, configuration and, once
/// bootstrap ran, the session and client.
pub struct Context<C> {
    pub options: GlobalOptions,
    pub config: Config,
    session: Option<Session>,
    client: Option<C>,
}

impl<C> Context<C> {
    pub fn new(options: GlobalOptions, config: Config) -> Self {
        Self {
            options,
            config,
            session: None,
            client: None,
        }
    }

    pub fn attach(&mut self, session: Session, client: C) {
        debug_assert!(self.client.is_none(), "bootstrap runs once per invocation");
        self.session = Some(session);
        self.client = Some(client);
    }

    pub fn client(&self) -> Result<&C, CommandError> {
        self.client.as_ref().ok_or(CommandError::NoSession)
    }

    pub fn session(&self) -> Result<&Session, CommandError> {
        self.session.as_ref().ok_or(CommandError::NoSession)
    }

    pub fn json(&self) -> bool {
        self.options.json
    }

    pub fn room_id(&self) -> Result<&str, CommandError> {
        self.options
            .room_id
            .as_deref()
            .map(str::trim)
            .filter(|room| !room.is_empty())
            .ok_or_else(|| CommandError::usage("no room given, use -R/--room"))
    }

    /// The `-U` user, parsed.
    pub fn target_user(&self) -> Result<UserId, CommandError> {
        Ok(UserId::parse(self.options.user_id.as_deref().unwrap_or_default())?)
    }

    /// The `-U` user if given, otherwise the logged-in user.
    pub fn target_user_or_self(&self) -> Result<String, CommandError> {
        match self.options.user_id.as_deref() {
            Some(user) if !user.trim().is_empty() => Ok(UserId::parse(user)?.to_string()),
            _ => Ok(self.session()?.user_id.clone()),
        }
    }
}

/// Unique per call, so a retried PUT is deduplicated by the server.
pub fn transaction_id() -> String {
    format!("mnotify{}.{:016x}", dates::now_millis(), OsRng.next_u64())
}

/// A leaf of the command tree.
pub trait Action {
    /// Whether a stored session and client must exist before `run`.
    const REQUIRES_SESSION: bool = true;

    async fn run<C: Homeserver>(
        self,
        ctx: &Context<C>,
        out: &mut dyn Write,
    ) -> Result<(), CommandError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_ids_differ() {
        assert_ne!(transaction_id(), transaction_id());
        assert!(transaction_id().starts_with("mnotify"));
    }
}

//! Turns the persisted session into an authenticated client before a command runs.

use reqwest::Client;
use thiserror::Error;

use crate::api::{self, Homeserver, MatrixClient};
use crate::config::Config;
use crate::discovery::{DiscoveryError, DiscoveryResolver};
use crate::session::{ConfigError, Session, SessionStore};
use crate::user_id::{UserId, UserIdError};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    UserId(#[from] UserIdError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("could not build http client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Produces the session and client a command needs.
pub trait Bootstrap {
    type Client: Homeserver;

    async fn bootstrap(&self) -> Result<(Session, Self::Client), BootstrapError>;
}

/// Session file, then discovery, then client.
///
/// Nothing is touched until `bootstrap` runs, so commands that never need a
/// session pay nothing for it.
pub struct SessionBootstrap {
    config: Config,
    store: SessionStore,
}

impl SessionBootstrap {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            store: SessionStore::new(config.session_path.clone()),
        }
    }
}

impl Bootstrap for SessionBootstrap {
    type Client = MatrixClient;

    async fn bootstrap(&self) -> Result<(Session, MatrixClient), BootstrapError> {
        let session = self.store.load()?;
        tracing::debug!(path = %self.store.path().display(), user = %session.user_id, "loaded session");
        let http = api::http_client(&self.config)?;
        let resolver = DiscoveryResolver::new(http.clone());
        let client = create_client(&session, &resolver, &http).await?;
        tracing::debug!(homeserver = %client.homeserver(), "client ready");
        Ok((session, client))
    }
}

/// Resolves the session user's homeserver and binds a client to it.
///
/// The access token is not checked here; a stale token only shows up when the
/// first real call fails.
pub async fn create_client(
    session: &Session,
    resolver: &DiscoveryResolver,
    http: &Client,
) -> Result<MatrixClient, BootstrapError> {
    let user = UserId::parse(&session.user_id)?;
    let discovered = resolver.resolve(&user).await?;
    Ok(MatrixClient::new(http.clone(), discovered.homeserver).with_session(session))
}

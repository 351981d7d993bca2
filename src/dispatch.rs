//! Runs one leaf command, bootstrapping a session first when it needs one.

use std::io::Write;

use thiserror::Error;

use crate::bootstrap::{Bootstrap, BootstrapError};
use crate::commands::{Action, CommandError, Context, GlobalOptions};
use crate::config::Config;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error(transparent)]
    Command(#[from] CommandError),
}

impl DispatchError {
    /// Bootstrap failures mean there is no usable login yet.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            DispatchError::Bootstrap(_) => Some("create a valid login"),
            DispatchError::Command(_) => None,
        }
    }
}

pub struct Dispatcher<B> {
    options: GlobalOptions,
    config: Config,
    bootstrap: B,
}

impl<B: Bootstrap> Dispatcher<B> {
    pub fn new(options: GlobalOptions, config: Config, bootstrap: B) -> Self {
        Self {
            options,
            config,
            bootstrap,
        }
    }

    pub async fn dispatch<A: Action>(self, action: A, out: &mut dyn Write) -> Result<(), DispatchError> {
        let mut ctx = Context::new(self.options, self.config);
        if A::REQUIRES_SESSION {
            let (session, client) = self.bootstrap.bootstrap().await?;
            ctx.attach(session, client);
        } else {
            tracing::debug!("skipping session bootstrap");
        }
        action.run(&ctx, out).await?;
        Ok(())
    }
}

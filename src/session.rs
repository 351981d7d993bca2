use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no session found at {}", .0.display())]
    Missing(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid session file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("session file {} has no {field}", path.display())]
    Incomplete { path: PathBuf, field: &'static str },
}

/// A persisted login: who we are and the token that proves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Session, ConfigError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing(self.path.clone()));
            }
            Err(err) => return Err(ConfigError::Io(err)),
        };

        let session: Session = serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: self.path.clone(),
            source,
        })?;
        if session.user_id.trim().is_empty() {
            return Err(self.incomplete("userId"));
        }
        if session.access_token.trim().is_empty() {
            return Err(self.incomplete("accessToken"));
        }
        Ok(session)
    }

    pub fn store(&self, session: &Session) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                ensure_dir(parent)?;
            }
        }

        let payload = serde_json::to_string_pretty(session).map_err(|source| ConfigError::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, payload)?;
        set_permissions(&self.path, 0o600)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), ConfigError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn incomplete(&self, field: &'static str) -> ConfigError {
        ConfigError::Incomplete {
            path: self.path.clone(),
            field,
        }
    }
}

fn ensure_dir(path: &Path) -> Result<(), io::Error> {
    fs::create_dir_all(path)?;
    set_permissions(path, 0o700)?;
    Ok(())
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> Result<(), io::Error> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> Result<(), io::Error> {
    Ok(())
}

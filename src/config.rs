use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub session_path: PathBuf,
    pub device_name: Option<String>,
    pub insecure: bool,
}

impl Config {
    pub fn load() -> Self {
        let session_path = env::var("MNOTIFY_CONFIG")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| default_config_dir().join("config.json"));

        let device_name = env::var("MNOTIFY_DEVICE_NAME")
            .ok()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let insecure = env::var_os("MNOTIFY_INSECURE").is_some();

        Self {
            session_path,
            device_name,
            insecure,
        }
    }

    /// Display name sent with a fresh login.
    pub fn device_display_name(&self) -> String {
        if let Some(name) = &self.device_name {
            return name.clone();
        }
        match hostname::get().ok().and_then(|name| name.into_string().ok()) {
            Some(host) => format!("{CRATE_NAME} on {host}"),
            None => CRATE_NAME.to_string(),
        }
    }
}

pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

fn default_config_dir() -> PathBuf {
    let base = env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".config")
        });
    base.join(CRATE_NAME)
}

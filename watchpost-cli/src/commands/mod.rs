//! Command handlers -- one module per subcommand

pub mod config;
pub mod plans;
pub mod plugins;
pub mod scan;

use std::path::{Path, PathBuf};

use watchpost_core::{WatchpostConfig, WatchpostError};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "watchpost.toml";

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl ConfigSource {
    /// `--config` wins; otherwise `./watchpost.toml` if it exists.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        match explicit {
            Some(path) => Self::File(path.to_path_buf()),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::File(default.to_path_buf())
                } else {
                    Self::Defaults
                }
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Defaults => "(defaults)".to_owned(),
        }
    }

    /// Loads, applies `WATCHPOST_*` overrides and validates.
    pub async fn load(&self) -> Result<WatchpostConfig, WatchpostError> {
        match self {
            Self::File(path) => WatchpostConfig::load(path).await,
            Self::Defaults => {
                let mut config = WatchpostConfig::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }
}

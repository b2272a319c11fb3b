//! Configuration -- `watchpost.toml` parsing and runtime settings.
//!
//! [`WatchpostConfig`] holds every section; each component reads its own.
//!
//! # Precedence
//! 1. CLI flags (highest)
//! 2. Environment variables (`WATCHPOST_SCHEDULER_WORKERS=8`)
//! 3. Config file (`watchpost.toml`)
//! 4. Defaults (`Default` impls)
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), watchpost_core::error::WatchpostError> {
//! use watchpost_core::config::WatchpostConfig;
//!
//! let config = WatchpostConfig::load("watchpost.toml").await?;
//! let config = WatchpostConfig::parse("[scheduler]\nworkers = 2")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, WatchpostError};
use crate::types::Weight;

/// Top-level watchpost configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchpostConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub plans: PlansConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
}

impl WatchpostConfig {
    /// Loads a file, applies env overrides and validates.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, WatchpostError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads a file without env overrides.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, WatchpostError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WatchpostError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                WatchpostError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, WatchpostError> {
        toml::from_str(toml_str).map_err(|e| {
            WatchpostError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Applies `WATCHPOST_{SECTION}_{FIELD}` environment variables.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "WATCHPOST_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "WATCHPOST_GENERAL_LOG_FORMAT");

        // Scheduler
        override_usize(&mut self.scheduler.workers, "WATCHPOST_SCHEDULER_WORKERS");
        override_usize(
            &mut self.scheduler.queue_capacity,
            "WATCHPOST_SCHEDULER_QUEUE_CAPACITY",
        );
        override_usize(
            &mut self.scheduler.heavy_concurrency,
            "WATCHPOST_SCHEDULER_HEAVY_CONCURRENCY",
        );
        override_u64(
            &mut self.scheduler.session_timeout_secs,
            "WATCHPOST_SCHEDULER_SESSION_TIMEOUT_SECS",
        );

        // HTTP
        override_u64(
            &mut self.http.connect_timeout_secs,
            "WATCHPOST_HTTP_CONNECT_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.http.request_timeout_secs,
            "WATCHPOST_HTTP_REQUEST_TIMEOUT_SECS",
        );
        override_string(&mut self.http.user_agent, "WATCHPOST_HTTP_USER_AGENT");

        // Plugins / plans / reports
        override_csv(&mut self.plugins.optional, "WATCHPOST_PLUGINS_OPTIONAL");
        override_string(&mut self.plans.path, "WATCHPOST_PLANS_PATH");
        override_usize(
            &mut self.reports.history_limit,
            "WATCHPOST_REPORTS_HISTORY_LIMIT",
        );
    }

    /// Validates value ranges.
    pub fn validate(&self) -> Result<(), WatchpostError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        let positive = [
            ("scheduler.workers", self.scheduler.workers as u64),
            ("scheduler.queue_capacity", self.scheduler.queue_capacity as u64),
            ("scheduler.heavy_concurrency", self.scheduler.heavy_concurrency as u64),
            ("scheduler.session_timeout_secs", self.scheduler.session_timeout_secs),
            ("http.connect_timeout_secs", self.http.connect_timeout_secs),
            ("http.request_timeout_secs", self.http.request_timeout_secs),
            ("reports.history_limit", self.reports.history_limit as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(invalid(field, "must be greater than 0".to_owned()));
            }
        }

        let mut seen = HashSet::new();
        for external in &self.plugins.external {
            if external.id.is_empty() {
                return Err(invalid("plugins.external.id", "must not be empty".to_owned()));
            }
            if !seen.insert(external.id.as_str()) {
                return Err(invalid(
                    "plugins.external.id",
                    format!("duplicate plugin id '{}'", external.id),
                ));
            }
            if external.program.is_empty() {
                return Err(invalid(
                    "plugins.external.program",
                    format!("plugin '{}' has no program", external.id),
                ));
            }
            if external.timeout_secs == 0 {
                return Err(invalid(
                    "plugins.external.timeout_secs",
                    format!("plugin '{}' must have a timeout greater than 0", external.id),
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> WatchpostError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// trace, debug, info, warn, error
    pub log_level: String,
    /// json, pretty
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// Execution scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker pool size
    pub workers: usize,
    /// Start-queue capacity
    pub queue_capacity: usize,
    /// Heavy-weight sessions allowed to run at once
    pub heavy_concurrency: usize,
    /// Outer bound on a single session
    pub session_timeout_secs: u64,
}

impl SchedulerConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
            heavy_concurrency: 1,
            session_timeout_secs: 900,
        }
    }
}

/// Blocking-backend HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Total request timeout
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            request_timeout_secs: 15,
            user_agent: format!("watchpost/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Plugin registry settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Optional built-in plugin ids to enable
    pub optional: Vec<String>,
    /// External-process plugins; all belong to the optional set
    pub external: Vec<ExternalPluginConfig>,
}

/// One external-process plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalPluginConfig {
    pub id: String,
    pub name: String,
    #[serde(default = "default_external_version")]
    pub version: String,
    #[serde(default)]
    pub weight: Weight,
    /// Executable path or name on `PATH`
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_external_timeout")]
    pub timeout_secs: u64,
}

impl ExternalPluginConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_external_version() -> String {
    "0.1".to_owned()
}

fn default_external_timeout() -> u64 {
    600
}

/// Plan catalog settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlansConfig {
    /// Plans file; empty means the built-in catalog
    pub path: String,
}

/// Report settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    /// Most recent scans a report looks at
    pub history_limit: usize,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self { history_limit: 100 }
    }
}

// --- env override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

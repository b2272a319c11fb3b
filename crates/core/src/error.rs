//! Error types -- per-domain errors rolled up into [`WatchpostError`].
//!
//! Request-validation errors carry a stable machine-readable reason code
//! (see [`WatchpostError::reason`]) that callers surface as
//! `{ "success": false, "error": <reason> }`.

/// Top-level watchpost error.
#[derive(Debug, thiserror::Error)]
pub enum WatchpostError {
    /// Configuration errors
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Plugin registry errors
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// Plan catalog errors
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Scan lifecycle / control errors
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// Scan store errors
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Scheduler errors
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// I/O errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchpostError {
    /// Stable reason code for client-facing `{success: false}` responses.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Scan(e) => e.reason(),
            Self::Catalog(e) => e.reason(),
            Self::Plugin(e) => e.reason(),
            Self::Storage(_) => "storage-failure",
            Self::Scheduler(_) => "scheduler-unavailable",
            Self::Config(_) => "invalid-configuration",
            Self::Io(_) => "io-failure",
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file does not exist
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Config could not be parsed
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A config value is out of range or malformed
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Plugin registry errors
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// No plugin is registered under the identifier
    #[error("no such plugin: {id}")]
    NoSuchPlugin { id: String },

    /// Two plugins claimed the same identifier
    #[error("plugin already registered: {id}")]
    AlreadyRegistered { id: String },

    /// A required plugin could not be loaded; the registry refuses to build
    #[error("required plugin '{id}' unavailable: {reason}")]
    RequiredUnavailable { id: String, reason: String },

    /// A plugin could not be constructed (optional entries are skipped on this)
    #[error("plugin '{id}' unavailable: {reason}")]
    Unavailable { id: String, reason: String },
}

impl PluginError {
    /// Stable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NoSuchPlugin { .. } => "no-such-plugin",
            Self::AlreadyRegistered { .. } => "plugin-already-registered",
            Self::RequiredUnavailable { .. } | Self::Unavailable { .. } => "plugin-unavailable",
        }
    }
}

/// Plan catalog errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// No plan with this name
    #[error("unknown plan: {name}")]
    UnknownPlan { name: String },

    /// A plan step names a plugin the registry does not know
    #[error("plan '{plan}' references unknown plugin '{plugin}'")]
    UnknownPlugin { plan: String, plugin: String },

    /// Two plans share a name
    #[error("duplicate plan name: {name}")]
    DuplicatePlan { name: String },

    /// Plan file could not be parsed
    #[error("failed to parse plans: {reason}")]
    ParseFailed { reason: String },
}

impl CatalogError {
    /// Stable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::UnknownPlan { .. } => "no-such-plan",
            Self::UnknownPlugin { .. } => "unknown-plugin",
            Self::DuplicatePlan { .. } => "duplicate-plan",
            Self::ParseFailed { .. } => "invalid-plan",
        }
    }
}

/// Scan control errors
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// No scan with this id
    #[error("no such scan: {id}")]
    NoSuchScan { id: String },

    /// Control command is neither START nor STOP
    #[error("unknown control command: {command}")]
    UnknownCommand { command: String },

    /// Command is not legal from the current state
    #[error("invalid state transition: cannot {command} a scan in state {from}")]
    InvalidStateTransition { from: String, command: String },
}

impl ScanError {
    /// Stable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NoSuchScan { .. } => "no-such-scan",
            Self::UnknownCommand { .. } => "unknown-state",
            Self::InvalidStateTransition { .. } => "invalid-state-transition",
        }
    }
}

/// Scan store errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Record does not exist
    #[error("record not found: {0}")]
    NotFound(String),

    /// Write could not be applied
    #[error("write failed: {0}")]
    WriteFailed(String),
}

/// Scheduler errors
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Start queue is full or closed
    #[error("queue unavailable: {0}")]
    QueueUnavailable(String),

    /// Scheduler has been shut down
    #[error("scheduler is shut down")]
    ShutDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_reasons_match_control_codes() {
        let err = ScanError::NoSuchScan {
            id: "x".to_owned(),
        };
        assert_eq!(err.reason(), "no-such-scan");

        let err = ScanError::UnknownCommand {
            command: "PAUSE".to_owned(),
        };
        assert_eq!(err.reason(), "unknown-state");

        let err = ScanError::InvalidStateTransition {
            from: "FINISHED".to_owned(),
            command: "START".to_owned(),
        };
        assert_eq!(err.reason(), "invalid-state-transition");
        assert!(err.to_string().contains("FINISHED"));
        assert!(err.to_string().contains("START"));
    }

    #[test]
    fn catalog_unknown_plan_reason() {
        let err: WatchpostError = CatalogError::UnknownPlan {
            name: "tickle".to_owned(),
        }
        .into();
        assert_eq!(err.reason(), "no-such-plan");
        assert!(err.to_string().contains("tickle"));
    }

    #[test]
    fn plugin_error_display() {
        let err = PluginError::NoSuchPlugin {
            id: "nmap".to_owned(),
        };
        assert_eq!(err.to_string(), "no such plugin: nmap");

        let err = PluginError::AlreadyRegistered {
            id: "alive".to_owned(),
        };
        assert_eq!(err.to_string(), "plugin already registered: alive");
    }

    #[test]
    fn unknown_plugin_display_names_plan_and_plugin() {
        let err = CatalogError::UnknownPlugin {
            plan: "basic".to_owned(),
            plugin: "csp".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("basic"));
        assert!(msg.contains("csp"));
    }

    #[test]
    fn domain_errors_convert_to_top_level() {
        let err: WatchpostError = StorageError::WriteFailed("disk full".to_owned()).into();
        assert!(matches!(err, WatchpostError::Storage(_)));
        assert_eq!(err.reason(), "storage-failure");

        let err: WatchpostError = SchedulerError::ShutDown.into();
        assert!(matches!(err, WatchpostError::Scheduler(_)));
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "scheduler.workers".to_owned(),
            reason: "must be greater than 0".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("scheduler.workers"));
        assert!(msg.contains("must be greater than 0"));
    }
}

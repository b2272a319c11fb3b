//! Watchpost core -- shared domain types, the plugin contract, errors and
//! configuration used by every other watchpost crate.

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod plugin;
pub mod scan;
pub mod types;

// --- re-exports ---

// errors
pub use error::{
    CatalogError, ConfigError, PluginError, ScanError, SchedulerError, StorageError,
    WatchpostError,
};

// config
pub use config::WatchpostConfig;

// events
pub use event::{SessionEvent, SessionReporter};

// plugin contract
pub use plugin::{
    BoxFuture, DynPlugin, FailureKind, Plugin, PluginContext, PluginFailure, PluginOutcome,
};

// scan records
pub use scan::{PlanRef, Scan, ScanMeta, ScanState, Session, SessionFailure, SessionState};

// domain types
pub use types::{
    Configuration, ExecutionMode, FurtherInfo, Issue, PluginDescriptor, Severity, Weight,
};

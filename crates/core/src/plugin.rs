//! Plugin contract -- what every scanner check implements.
//!
//! A plugin receives a [`PluginContext`] (resolved configuration, target,
//! progress reporter) and returns exactly one [`PluginOutcome`]:
//!
//! - [`PluginOutcome::Completed`]: zero or more issues, the pipeline continues
//! - [`PluginOutcome::Aborted`]: no further plan step of the scan may run
//! - [`PluginOutcome::Failed`]: timeout, crash or error; the session becomes
//!   FAILED and the pipeline continues
//!
//! Failures are values, never `Err`: a misbehaving check cannot take the
//! scheduler down with it. Plugins must be safe to invoke again for a new
//! scan.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::SessionReporter;
use crate::types::{Configuration, Issue, PluginDescriptor};

/// Boxed future used by the dyn-compatible plugin trait.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ─── Outcome ─────────────────────────────────────────────────────────

/// Failure class of a plugin execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Execution exceeded its time limit
    Timeout,
    /// Plugin panicked or its process died
    Crashed,
    /// Plugin reported an error (e.g. the target answered with a 5xx)
    Error,
    /// External process violated the line protocol
    Protocol,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Crashed => write!(f, "crashed"),
            Self::Error => write!(f, "error"),
            Self::Protocol => write!(f, "protocol"),
        }
    }
}

/// Failed execution, with any issues reported before the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginFailure {
    pub kind: FailureKind,
    pub message: String,
    pub issues: Vec<Issue>,
}

impl PluginFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            issues: Vec::new(),
        }
    }

    /// Keeps issues reported before the failure.
    pub fn with_issues(mut self, issues: Vec<Issue>) -> Self {
        self.issues = issues;
        self
    }
}

/// Result of one plugin execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginOutcome {
    /// Normal completion
    Completed(Vec<Issue>),
    /// Halt the remaining plan steps of this scan
    Aborted(Vec<Issue>),
    /// Execution error
    Failed(PluginFailure),
}

impl PluginOutcome {
    /// Shorthand for a failed outcome without issues.
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failed(PluginFailure::new(kind, message))
    }

    /// Issues carried by the outcome.
    pub fn issues(&self) -> &[Issue] {
        match self {
            Self::Completed(issues) | Self::Aborted(issues) => issues,
            Self::Failed(failure) => &failure.issues,
        }
    }
}

// ─── Context ─────────────────────────────────────────────────────────

/// Everything a plugin gets for one execution.
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub scan_id: Uuid,
    pub session_id: Uuid,
    /// Target identifier, usually a URL
    pub target: String,
    /// Session configuration after deep merge
    pub configuration: Configuration,
    /// Progress and artifact sink
    pub reporter: SessionReporter,
}

impl PluginContext {
    /// Reads a string value from the configuration.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.configuration.get(key).and_then(|v| v.as_str())
    }
}

// ─── Plugin Trait ────────────────────────────────────────────────────

/// Scanner check.
///
/// # Example
/// ```ignore
/// struct Banner {
///     descriptor: PluginDescriptor,
/// }
///
/// impl Plugin for Banner {
///     fn descriptor(&self) -> &PluginDescriptor {
///         &self.descriptor
///     }
///
///     async fn execute(&self, ctx: PluginContext) -> PluginOutcome {
///         PluginOutcome::Completed(vec![])
///     }
/// }
/// ```
pub trait Plugin: Send + Sync {
    /// Metadata reported to the registry.
    fn descriptor(&self) -> &PluginDescriptor;

    /// Runs the check once.
    fn execute(&self, ctx: PluginContext) -> impl Future<Output = PluginOutcome> + Send;
}

// ─── DynPlugin Trait ─────────────────────────────────────────────────

/// dyn-compatible twin of [`Plugin`].
///
/// `Plugin` uses RPITIT and cannot be made into a trait object;
/// `DynPlugin` returns [`BoxFuture`] so the registry can hold
/// `Arc<dyn DynPlugin>` handles.
pub trait DynPlugin: Send + Sync {
    fn descriptor(&self) -> &PluginDescriptor;

    fn execute(&self, ctx: PluginContext) -> BoxFuture<'_, PluginOutcome>;
}

/// Every [`Plugin`] is a [`DynPlugin`].
impl<T: Plugin> DynPlugin for T {
    fn descriptor(&self) -> &PluginDescriptor {
        Plugin::descriptor(self)
    }

    fn execute(&self, ctx: PluginContext) -> BoxFuture<'_, PluginOutcome> {
        Box::pin(Plugin::execute(self, ctx))
    }
}

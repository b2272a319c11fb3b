//! Domain types -- findings and plugin metadata shared by every crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// String-keyed configuration object handed to plugins.
pub type Configuration = serde_json::Map<String, serde_json::Value>;

/// Severity of a reported issue.
///
/// `Ord` follows `Info < Low < Medium < High < Fatal`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// Informational finding
    #[default]
    Info,
    /// Low severity
    Low,
    /// Medium severity
    Medium,
    /// High severity
    High,
    /// The check could not proceed; usually paired with an abort
    Fatal,
}

impl Severity {
    /// All severities, lowest first.
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Fatal,
    ];

    /// Parses a severity name, case-insensitively.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" | "informational" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "fatal" => Some(Self::Fatal),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "Info"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Reference link attached to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FurtherInfo {
    /// Link target
    pub url: String,
    /// Link title
    pub title: String,
}

/// A single finding reported by a plugin.
///
/// Issues are immutable once attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Stable finding code (e.g. `XFO-0`)
    pub code: String,
    /// One-line summary
    pub summary: String,
    /// Longer description
    #[serde(default)]
    pub description: String,
    /// Severity
    pub severity: Severity,
    /// URLs the finding applies to
    #[serde(default)]
    pub urls: Vec<String>,
    /// Further reading
    #[serde(default)]
    pub further_info: Vec<FurtherInfo>,
}

impl Issue {
    /// Creates an issue with no links.
    pub fn new(
        code: impl Into<String>,
        severity: Severity,
        summary: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            description: description.into(),
            severity,
            urls: Vec::new(),
            further_info: Vec::new(),
        }
    }

    /// Adds the URL the finding was observed on.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.urls.push(url.into());
        self
    }

    /// Attaches further-reading links.
    pub fn with_further_info(mut self, links: Vec<FurtherInfo>) -> Self {
        self.further_info = links;
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.severity, self.code, self.summary)
    }
}

/// Resource class of a plugin, used as a scheduling hint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weight {
    /// Single-request style checks
    #[default]
    Light,
    /// Long-running or resource hungry checks
    Heavy,
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Heavy => write!(f, "heavy"),
        }
    }
}

/// Backend a plugin runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Synchronous check on a blocking worker thread
    #[default]
    Blocking,
    /// Delegated to an isolated child process
    ExternalProcess,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking => write!(f, "blocking"),
            Self::ExternalProcess => write!(f, "external-process"),
        }
    }
}

/// Read-only plugin metadata.
///
/// Sessions keep a copy taken at scan creation; later registry changes
/// never reach existing scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Registry identifier (e.g. `"x-frame-options"`)
    pub identifier: String,
    /// Display name (e.g. `"XFrameOptions"`)
    pub name: String,
    /// Plugin version
    pub version: String,
    /// Scheduling weight
    pub weight: Weight,
    /// Execution backend
    #[serde(default)]
    pub mode: ExecutionMode,
}

impl fmt::Display for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} v{}, {}, {})",
            self.identifier, self.name, self.version, self.weight, self.mode
        )
    }
}

//! Scan and session records and their state machines.
//!
//! # Scan lifecycle
//! ```text
//! CREATED → QUEUED → STARTED → STOPPING → { FINISHED, STOPPED, FAILED }
//! ```
//!
//! # Session lifecycle
//! ```text
//! CREATED → QUEUED → STARTED → { FINISHED, FAILED, ABORTED, STOPPED }
//!    └──────────┴─────────────→ { STOPPED, CANCELLED }
//! ```
//!
//! States only advance. Every transition goes through [`Scan::advance`] or
//! [`Session::advance`], which refuse regressions and stamp timestamps so
//! that `created <= queued <= started <= finished` always holds.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plugin::FailureKind;
use crate::types::{Configuration, Issue, PluginDescriptor};

// ─── ScanState ───────────────────────────────────────────────────────

/// Scan lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanState {
    /// Created, waiting for START
    Created,
    /// Handed to the scheduler
    Queued,
    /// A worker is driving its sessions
    Started,
    /// STOP accepted, waiting for the stop handler
    Stopping,
    /// Every session terminal, no abort
    Finished,
    /// STOP processed before natural completion
    Stopped,
    /// A session aborted, or infrastructure failed
    Failed,
}

impl ScanState {
    /// Returns `true` for FINISHED, STOPPED and FAILED.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Stopped | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Queued => 1,
            Self::Started => 2,
            Self::Stopping => 3,
            Self::Finished | Self::Stopped | Self::Failed => 4,
        }
    }

    /// Returns `true` if moving to `next` advances the lifecycle.
    pub fn can_advance_to(self, next: ScanState) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Queued => write!(f, "QUEUED"),
            Self::Started => write!(f, "STARTED"),
            Self::Stopping => write!(f, "STOPPING"),
            Self::Finished => write!(f, "FINISHED"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

// ─── SessionState ────────────────────────────────────────────────────

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Created with the scan
    Created,
    /// Picked up by the worker driving the scan
    Queued,
    /// Plugin is executing
    Started,
    /// Plugin completed normally
    Finished,
    /// Plugin timed out, crashed or errored
    Failed,
    /// Plugin signaled ABORT
    Aborted,
    /// Scan was stopped before this session completed
    Stopped,
    /// An earlier session aborted; this one never ran
    Cancelled,
}

impl SessionState {
    /// Returns `true` for every state a session cannot leave.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Failed | Self::Aborted | Self::Stopped | Self::Cancelled
        )
    }

    fn rank(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Queued => 1,
            Self::Started => 2,
            _ => 3,
        }
    }

    /// Returns `true` if moving to `next` advances the lifecycle.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Queued => write!(f, "QUEUED"),
            Self::Started => write!(f, "STARTED"),
            Self::Finished => write!(f, "FINISHED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Aborted => write!(f, "ABORTED"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

// ─── Records ─────────────────────────────────────────────────────────

/// Plan snapshot recorded on a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRef {
    /// Plan name
    pub name: String,
    /// Catalog revision the plan was read at
    pub revision: u32,
}

/// Caller-supplied bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanMeta {
    /// Requester, if known
    #[serde(default)]
    pub owner: Option<String>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Why a session FAILED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFailure {
    /// Host the worker ran on
    pub hostname: String,
    /// Human-readable cause
    pub message: String,
    /// Failure class
    pub kind: FailureKind,
}

/// Execution record of one plan step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub state: SessionState,
    /// Descriptor snapshot taken when the scan was created
    pub plugin: PluginDescriptor,
    /// Step base configuration deep-merged with the scan configuration
    pub configuration: Configuration,
    pub description: String,
    pub artifacts: BTreeMap<String, String>,
    pub issues: Vec<Issue>,
    pub created: DateTime<Utc>,
    pub queued: Option<DateTime<Utc>>,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    /// 0.0..=1.0 once the plugin reports any
    pub progress: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<SessionFailure>,
}

impl Session {
    /// Creates a session in CREATED.
    pub fn new(
        plugin: PluginDescriptor,
        configuration: Configuration,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Created,
            plugin,
            configuration,
            description: description.into(),
            artifacts: BTreeMap::new(),
            issues: Vec::new(),
            created: now,
            queued: None,
            started: None,
            finished: None,
            progress: None,
            failure: None,
        }
    }

    /// Moves the session to `next`, stamping the matching timestamp.
    ///
    /// Returns `false` and leaves the record untouched when `next` would
    /// not advance the lifecycle.
    pub fn advance(&mut self, next: SessionState, now: DateTime<Utc>) -> bool {
        if !self.state.can_advance_to(next) {
            return false;
        }
        let floor = self.finished.or(self.started).or(self.queued).unwrap_or(self.created);
        let at = monotonic(now, floor);
        match next {
            SessionState::Queued => self.queued = Some(at),
            SessionState::Started => self.started = Some(at),
            _ if next.is_terminal() => self.finished = Some(at),
            _ => {}
        }
        if next == SessionState::Finished {
            self.progress = Some(1.0);
        }
        self.state = next;
        true
    }

    /// Records a progress report, clamped to `0.0..=1.0`.
    pub fn set_progress(&mut self, progress: f32) {
        if self.state.is_terminal() {
            return;
        }
        let clamped = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
        self.progress = Some(clamped);
    }
}

/// One instantiation of a plan against a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    pub id: Uuid,
    pub state: ScanState,
    pub created: DateTime<Utc>,
    pub queued: Option<DateTime<Utc>>,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    pub plan: PlanRef,
    /// Request configuration as received (`target` plus plugin overrides)
    pub configuration: Configuration,
    /// Sessions in plan order
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub meta: ScanMeta,
}

impl Scan {
    /// Creates a scan in CREATED with only `created` stamped.
    pub fn new(
        plan: PlanRef,
        configuration: Configuration,
        sessions: Vec<Session>,
        meta: ScanMeta,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: ScanState::Created,
            created: now,
            queued: None,
            started: None,
            finished: None,
            plan,
            configuration,
            sessions,
            meta,
        }
    }

    /// Target named in the scan configuration.
    pub fn target(&self) -> Option<&str> {
        self.configuration.get("target").and_then(|v| v.as_str())
    }

    /// Moves the scan to `next`, stamping the matching timestamp.
    ///
    /// Returns `false` and leaves the record untouched when `next` would
    /// not advance the lifecycle.
    pub fn advance(&mut self, next: ScanState, now: DateTime<Utc>) -> bool {
        if !self.state.can_advance_to(next) {
            return false;
        }
        let floor = self.finished.or(self.started).or(self.queued).unwrap_or(self.created);
        let at = monotonic(now, floor);
        match next {
            ScanState::Queued => self.queued = Some(at),
            ScanState::Started => self.started = Some(at),
            _ if next.is_terminal() => self.finished = Some(at),
            _ => {}
        }
        self.state = next;
        true
    }

    /// Position of a session in plan order.
    pub fn session_index(&self, session_id: Uuid) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == session_id)
    }

    /// Returns `true` once no session can run any more.
    pub fn all_sessions_terminal(&self) -> bool {
        self.sessions.iter().all(|s| s.state.is_terminal())
    }

    /// Moves every non-terminal session to STOPPED.
    pub fn stop_remaining_sessions(&mut self, now: DateTime<Utc>) -> usize {
        self.sessions
            .iter_mut()
            .map(|s| s.advance(SessionState::Stopped, now))
            .filter(|advanced| *advanced)
            .count()
    }

    /// Closes every non-terminal session of a scan that failed outside any
    /// plugin: sessions that were picked up fail, untouched ones are
    /// cancelled.
    pub fn fail_remaining_sessions(&mut self, now: DateTime<Utc>) -> usize {
        let mut closed = 0;
        for session in &mut self.sessions {
            let next = if session.state == SessionState::Created {
                SessionState::Cancelled
            } else {
                SessionState::Failed
            };
            if session.advance(next, now) {
                closed += 1;
            }
        }
        closed
    }
}

/// Timestamp that never precedes `floor`.
pub fn monotonic(now: DateTime<Utc>, floor: DateTime<Utc>) -> DateTime<Utc> {
    now.max(floor)
}

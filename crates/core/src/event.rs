//! Session events -- progress and artifacts reported while a plugin runs.
//!
//! A [`SessionReporter`] is handed to the plugin inside its context; the
//! scheduler owns the receiving end and persists every event as it
//! arrives. Sending is synchronous so blocking checks running on a worker
//! thread can report without an async runtime.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

/// Event emitted by a running plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum SessionEvent {
    /// Completion fraction, 0.0..=1.0
    Progress(f32),
    /// Named output blob
    Artifact { name: String, content: String },
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progress(p) => write!(f, "progress {:.0}%", p * 100.0),
            Self::Artifact { name, content } => {
                write!(f, "artifact {name} ({} bytes)", content.len())
            }
        }
    }
}

/// Sending half of a session's event stream.
#[derive(Debug, Clone)]
pub struct SessionReporter {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionReporter {
    /// Creates a reporter and the receiver the scheduler drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Reporter whose events go nowhere.
    pub fn detached() -> Self {
        let (tx, _) = mpsc::unbounded_channel();
        Self { tx }
    }

    /// Reports progress.
    pub fn progress(&self, fraction: f32) {
        self.send(SessionEvent::Progress(fraction));
    }

    /// Reports an artifact.
    pub fn artifact(&self, name: impl Into<String>, content: impl Into<String>) {
        self.send(SessionEvent::Artifact {
            name: name.into(),
            content: content.into(),
        });
    }

    fn send(&self, event: SessionEvent) {
        // the session may already be terminal; late events are dropped
        if self.tx.send(event).is_err() {
            trace!("session event dropped, receiver closed");
        }
    }
}

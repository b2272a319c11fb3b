//! Scan orchestrator -- creates scans and applies client control commands.
//!
//! # Scan lifecycle
//! ```text
//! CREATED --START--> QUEUED --worker--> STARTED --> FINISHED | FAILED
//!    |                  |                  |
//!    +-------STOP-------+-------STOP-------+--> STOPPING --stop handler--> STOPPED
//! ```
//!
//! Command checks and the transition they allow happen inside one store
//! update, so two racing commands cannot both succeed.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};
use uuid::Uuid;
use watchpost_core::metrics as m;
use watchpost_core::{
    CatalogError, Configuration, Scan, ScanError, ScanMeta, ScanState, Session, StorageError,
    WatchpostError,
};

use crate::aggregate::{ScanSummary, summarize};
use crate::catalog::PlanCatalog;
use crate::executor::mark_scan_failed;
use crate::merge::deep_merge;
use crate::scheduler::Scheduler;
use crate::store::{ScanStore, update_with};

/// Client control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanCommand {
    Start,
    Stop,
}

impl FromStr for ScanCommand {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "START" => Ok(Self::Start),
            "STOP" => Ok(Self::Stop),
            other => Err(ScanError::UnknownCommand {
                command: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for ScanCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "START"),
            Self::Stop => write!(f, "STOP"),
        }
    }
}

/// Entry point for scan creation and control.
pub struct ScanOrchestrator {
    catalog: Arc<PlanCatalog>,
    store: Arc<dyn ScanStore>,
    scheduler: Arc<Scheduler>,
}

impl ScanOrchestrator {
    pub fn new(
        catalog: Arc<PlanCatalog>,
        store: Arc<dyn ScanStore>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self {
            catalog,
            store,
            scheduler,
        }
    }

    /// Creates a CREATED scan of `plan_name` against `configuration`.
    pub fn create(
        &self,
        plan_name: &str,
        configuration: Configuration,
    ) -> Result<Scan, WatchpostError> {
        self.create_with_meta(plan_name, configuration, ScanMeta::default())
    }

    /// Like [`create`](Self::create), recording owner and tags.
    pub fn create_with_meta(
        &self,
        plan_name: &str,
        configuration: Configuration,
        meta: ScanMeta,
    ) -> Result<Scan, WatchpostError> {
        let plan = self
            .catalog
            .get(plan_name)?
            .ok_or_else(|| CatalogError::UnknownPlan {
                name: plan_name.to_owned(),
            })?;

        let now = Utc::now();
        let sessions = plan
            .workflow
            .iter()
            .map(|step| {
                Session::new(
                    step.plugin.clone(),
                    deep_merge(&step.configuration, &configuration),
                    step.description.clone(),
                    now,
                )
            })
            .collect();
        let scan = Scan::new(plan.plan_ref(), configuration, sessions, meta, now);
        self.store.insert(scan.clone())?;

        metrics::counter!(m::SCANS_CREATED_TOTAL).increment(1);
        info!(scan_id = %scan.id, plan = %plan.name, sessions = scan.sessions.len(), "scan created");
        Ok(scan)
    }

    /// Applies a textual command (`START` or `STOP`).
    pub fn control(&self, id: Uuid, command: &str) -> Result<(), WatchpostError> {
        self.get(id)?;
        match command.parse::<ScanCommand>()? {
            ScanCommand::Start => self.start(id),
            ScanCommand::Stop => self.stop(id),
        }
    }

    /// CREATED -> QUEUED, then hands the scan to the scheduler.
    pub fn start(&self, id: Uuid) -> Result<(), WatchpostError> {
        self.transition(id, ScanCommand::Start, |scan| {
            scan.state == ScanState::Created && scan.advance(ScanState::Queued, Utc::now())
        })?;
        info!(scan_id = %id, "scan queued");

        if let Err(e) = self.scheduler.submit(id) {
            error!(scan_id = %id, error = %e, "could not enqueue scan");
            mark_scan_failed(&*self.store, id);
            return Err(e.into());
        }
        Ok(())
    }

    /// Any non-terminal state -> STOPPING, then signals the stop handler.
    /// A repeated STOP on a STOPPING scan is acknowledged without a second
    /// signal.
    pub fn stop(&self, id: Uuid) -> Result<(), WatchpostError> {
        let mut already_stopping = false;
        self.transition(id, ScanCommand::Stop, |scan| {
            already_stopping = scan.state == ScanState::Stopping;
            already_stopping
                || (!scan.state.is_terminal() && scan.advance(ScanState::Stopping, Utc::now()))
        })?;
        if already_stopping {
            debug!(scan_id = %id, "scan already stopping");
            return Ok(());
        }
        info!(scan_id = %id, "scan stopping");

        if let Err(e) = self.scheduler.signal_stop(id) {
            error!(scan_id = %id, error = %e, "could not signal stop");
            mark_scan_failed(&*self.store, id);
            return Err(e.into());
        }
        Ok(())
    }

    fn transition(
        &self,
        id: Uuid,
        command: ScanCommand,
        accept: impl FnOnce(&mut Scan) -> bool,
    ) -> Result<(), WatchpostError> {
        let (rejected_from, _) = update_with(&*self.store, id, |scan| {
            let from = scan.state;
            (!accept(scan)).then_some(from)
        })
        .map_err(|e| match e {
            StorageError::NotFound(_) => WatchpostError::from(ScanError::NoSuchScan {
                id: id.to_string(),
            }),
            other => other.into(),
        })?;

        match rejected_from {
            Some(from) => Err(ScanError::InvalidStateTransition {
                from: from.to_string(),
                command: command.to_string(),
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Full scan record.
    pub fn get(&self, id: Uuid) -> Result<Scan, WatchpostError> {
        self.store.get(id)?.ok_or_else(|| {
            ScanError::NoSuchScan {
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Client-facing summary.
    pub fn summary(&self, id: Uuid) -> Result<ScanSummary, WatchpostError> {
        Ok(summarize(&self.get(id)?))
    }

    /// Polls every `poll` until the scan is terminal.
    pub async fn wait_until_terminal(
        &self,
        id: Uuid,
        poll: Duration,
    ) -> Result<Scan, WatchpostError> {
        loop {
            let scan = self.get(id)?;
            if scan.state.is_terminal() {
                return Ok(scan);
            }
            tokio::time::sleep(poll).await;
        }
    }
}

impl fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("catalog", &self.catalog)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_exactly() {
        assert_eq!("START".parse::<ScanCommand>().unwrap(), ScanCommand::Start);
        assert_eq!("STOP".parse::<ScanCommand>().unwrap(), ScanCommand::Stop);

        let err = "PAUSE".parse::<ScanCommand>().unwrap_err();
        assert_eq!(err.reason(), "unknown-state");
        assert!("start".parse::<ScanCommand>().is_err());
    }

    #[test]
    fn command_display_matches_wire_form() {
        for command in [ScanCommand::Start, ScanCommand::Stop] {
            assert_eq!(command.to_string().parse::<ScanCommand>().unwrap(), command);
        }
    }
}

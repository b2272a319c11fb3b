//! Scan executor -- drives one scan's sessions in plan order.
//!
//! # Session pipeline
//! ```text
//! CREATED -> QUEUED -> [heavy permit] -> STARTED -> plugin -> FINISHED | FAILED | ABORTED
//! ```
//!
//! Every transition is written to the store before the next step, and the
//! scan state is re-checked inside the same update that starts a session:
//! once a STOP has been accepted no further session starts. A plugin runs
//! in its own task under the session timeout, so a panic or a hang only
//! fails that session.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use watchpost_core::config::SchedulerConfig;
use watchpost_core::metrics as m;
use watchpost_core::{
    DynPlugin, FailureKind, Issue, PluginContext, PluginFailure, PluginOutcome, Scan, ScanState,
    SchedulerError, SessionEvent, SessionFailure, SessionReporter, SessionState, Severity,
    WatchpostError, Weight,
};
use watchpost_plugins::panic_message;

use crate::registry::PluginRegistry;
use crate::store::{ScanStore, update_with};

/// Code of the issue recorded for a failed session.
pub const FAILURE_CODE: &str = "WATCHPOST-FAILURE";

/// Whether the pipeline continues after a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Halt,
}

/// Runs scans against the registry and store.
pub struct ScanExecutor {
    registry: Arc<PluginRegistry>,
    store: Arc<dyn ScanStore>,
    session_timeout: Duration,
    heavy: Arc<Semaphore>,
    hostname: String,
}

impl ScanExecutor {
    pub fn new(
        registry: Arc<PluginRegistry>,
        store: Arc<dyn ScanStore>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            store,
            session_timeout: config.session_timeout(),
            heavy: Arc::new(Semaphore::new(config.heavy_concurrency)),
            hostname: local_hostname(),
        }
    }

    /// Drives scan `id` from QUEUED until it is terminal or a STOP is seen.
    ///
    /// Infrastructure errors mark the scan FAILED.
    pub async fn run_scan(&self, id: Uuid) {
        metrics::gauge!(m::SCHEDULER_ACTIVE_SCANS).increment(1.0);
        if let Err(e) = self.drive(id).await {
            error!(scan_id = %id, error = %e, "scan aborted by infrastructure error");
            self.fail_scan(id);
        }
        metrics::gauge!(m::SCHEDULER_ACTIVE_SCANS).decrement(1.0);
    }

    async fn drive(&self, id: Uuid) -> Result<(), WatchpostError> {
        let (started, scan) = update_with(&*self.store, id, |scan| {
            scan.state == ScanState::Queued && scan.advance(ScanState::Started, Utc::now())
        })?;
        if !started {
            debug!(scan_id = %id, state = %scan.state, "scan is not runnable");
            return Ok(());
        }
        info!(scan_id = %id, plan = %scan.plan.name, sessions = scan.sessions.len(), "scan started");

        for index in 0..scan.sessions.len() {
            if self.run_session(id, index).await? == Flow::Halt {
                break;
            }
        }

        let (finished, scan) = update_with(&*self.store, id, |scan| {
            scan.state == ScanState::Started
                && scan.all_sessions_terminal()
                && scan.advance(ScanState::Finished, Utc::now())
        })?;
        if finished {
            info!(scan_id = %id, "scan finished");
            record_scan_completed(ScanState::Finished);
        } else {
            debug!(scan_id = %id, state = %scan.state, "scan left without finishing");
        }
        Ok(())
    }

    async fn run_session(&self, scan_id: Uuid, index: usize) -> Result<Flow, WatchpostError> {
        let (queued, scan) = update_with(&*self.store, scan_id, |scan| {
            scan.state == ScanState::Started
                && scan
                    .sessions
                    .get_mut(index)
                    .is_some_and(|s| s.advance(SessionState::Queued, Utc::now()))
        })?;
        if !queued {
            return Ok(Flow::Halt);
        }
        let Some(session) = scan.sessions.get(index) else {
            return Ok(Flow::Halt);
        };
        let plugin_id = session.plugin.identifier.clone();
        let session_id = session.id;

        let _permit = if session.plugin.weight == Weight::Heavy {
            let permit = Arc::clone(&self.heavy)
                .acquire_owned()
                .await
                .map_err(|_| SchedulerError::ShutDown)?;
            Some(permit)
        } else {
            None
        };

        let (started, scan) = update_with(&*self.store, scan_id, |scan| {
            scan.state == ScanState::Started
                && scan
                    .sessions
                    .get_mut(index)
                    .is_some_and(|s| s.advance(SessionState::Started, Utc::now()))
        })?;
        if !started {
            debug!(%scan_id, %session_id, "scan left STARTED, session not started");
            return Ok(Flow::Halt);
        }
        info!(%scan_id, %session_id, plugin = %plugin_id, "session started");

        let Some(session) = scan.sessions.get(index) else {
            return Ok(Flow::Halt);
        };
        let configuration = session.configuration.clone();
        let target = configuration
            .get("target")
            .and_then(|v| v.as_str())
            .or(scan.target())
            .unwrap_or_default()
            .to_owned();

        let outcome = match self.registry.resolve(&plugin_id) {
            Ok(plugin) => {
                let (reporter, events) = SessionReporter::channel();
                let ctx = PluginContext {
                    scan_id,
                    session_id,
                    target,
                    configuration,
                    reporter,
                };
                self.execute(plugin, ctx, events, index).await
            }
            Err(e) => PluginOutcome::failed(FailureKind::Error, e.to_string()),
        };

        self.record(scan_id, index, &plugin_id, outcome)
    }

    /// Runs the plugin in its own task, persisting events as they arrive.
    async fn execute(
        &self,
        plugin: Arc<dyn DynPlugin>,
        ctx: PluginContext,
        mut events: tokio::sync::mpsc::UnboundedReceiver<SessionEvent>,
        index: usize,
    ) -> PluginOutcome {
        let scan_id = ctx.scan_id;
        let plugin_id = plugin.descriptor().identifier.clone();
        let begin = Instant::now();

        let handle = tokio::spawn(async move { plugin.execute(ctx).await });
        let abort = handle.abort_handle();
        let run = tokio::time::timeout(self.session_timeout, handle);
        tokio::pin!(run);

        let result = loop {
            tokio::select! {
                result = &mut run => break result,
                Some(event) = events.recv() => self.apply_event(scan_id, index, event),
            }
        };
        while let Ok(event) = events.try_recv() {
            self.apply_event(scan_id, index, event);
        }

        metrics::histogram!(m::PLUGIN_DURATION_SECONDS, m::LABEL_PLUGIN => plugin_id.clone())
            .record(begin.elapsed().as_secs_f64());

        match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => {
                let message = if join_err.is_panic() {
                    format!("plugin panicked: {}", panic_message(join_err.into_panic()))
                } else {
                    format!("plugin task was cancelled: {join_err}")
                };
                warn!(%scan_id, plugin = %plugin_id, message = %message, "plugin crashed");
                PluginOutcome::failed(FailureKind::Crashed, message)
            }
            Err(_elapsed) => {
                abort.abort();
                warn!(%scan_id, plugin = %plugin_id, timeout_secs = self.session_timeout.as_secs(), "session timed out");
                PluginOutcome::failed(
                    FailureKind::Timeout,
                    format!("session did not finish within {:?}", self.session_timeout),
                )
            }
        }
    }

    fn apply_event(&self, scan_id: Uuid, index: usize, event: SessionEvent) {
        debug!(%scan_id, index, %event, "session event");
        let result = self.store.update(scan_id, &mut |scan| {
            let Some(session) = scan.sessions.get_mut(index) else {
                return;
            };
            if session.state.is_terminal() {
                return;
            }
            match &event {
                SessionEvent::Progress(p) => session.set_progress(*p),
                SessionEvent::Artifact { name, content } => {
                    session.artifacts.insert(name.clone(), content.clone());
                }
            }
        });
        if let Err(e) = result {
            error!(%scan_id, error = %e, "failed to persist session event");
        }
    }

    /// Writes the outcome and decides whether the pipeline continues.
    fn record(
        &self,
        scan_id: Uuid,
        index: usize,
        plugin_id: &str,
        outcome: PluginOutcome,
    ) -> Result<Flow, WatchpostError> {
        let now = Utc::now();
        let hostname = self.hostname.clone();
        let state = match &outcome {
            PluginOutcome::Completed(_) => SessionState::Finished,
            PluginOutcome::Aborted(_) => SessionState::Aborted,
            PluginOutcome::Failed(_) => SessionState::Failed,
        };

        let ((recorded, scan_failed), _) = update_with(&*self.store, scan_id, |scan| {
            apply_outcome(scan, index, state, outcome, hostname, now)
        })?;

        if !recorded {
            warn!(%scan_id, plugin = plugin_id, "discarding result of a session that is already terminal");
            return Ok(Flow::Halt);
        }

        metrics::counter!(
            m::SESSIONS_COMPLETED_TOTAL,
            m::LABEL_STATE => state.to_string(),
            m::LABEL_PLUGIN => plugin_id.to_owned()
        )
        .increment(1);
        info!(%scan_id, plugin = plugin_id, %state, "session completed");

        if state == SessionState::Aborted {
            info!(%scan_id, plugin = plugin_id, "plugin aborted the scan");
            if scan_failed {
                record_scan_completed(ScanState::Failed);
            }
            return Ok(Flow::Halt);
        }
        Ok(Flow::Continue)
    }

    /// Handles a STOP signal: stops every open session and the scan.
    pub fn stop_scan(&self, id: Uuid) {
        let now = Utc::now();
        let result = update_with(&*self.store, id, |scan| {
            if scan.state != ScanState::Stopping {
                return None;
            }
            let stopped = scan.stop_remaining_sessions(now);
            scan.advance(ScanState::Stopped, now);
            Some(stopped)
        });
        match result {
            Ok((Some(sessions), _)) => {
                info!(scan_id = %id, sessions_stopped = sessions, "scan stopped");
                record_scan_completed(ScanState::Stopped);
            }
            Ok((None, scan)) => {
                debug!(scan_id = %id, state = %scan.state, "stop signal ignored");
            }
            Err(e) => {
                error!(scan_id = %id, error = %e, "failed to stop scan");
                self.fail_scan(id);
            }
        }
    }

    /// Best-effort FAILED marking after an infrastructure error.
    pub fn fail_scan(&self, id: Uuid) {
        mark_scan_failed(&*self.store, id);
    }
}

impl std::fmt::Debug for ScanExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanExecutor")
            .field("session_timeout", &self.session_timeout)
            .field("hostname", &self.hostname)
            .finish()
    }
}

/// Issue recorded for a failed session.
pub fn failure_issue(plugin_name: &str, kind: FailureKind, message: &str) -> Issue {
    Issue::new(
        FAILURE_CODE,
        Severity::High,
        format!("{plugin_name} failed ({kind})"),
        message,
    )
}

/// Writes a plugin outcome onto session `index`. Returns whether the
/// session accepted it and whether an abort moved the scan to FAILED.
fn apply_outcome(
    scan: &mut Scan,
    index: usize,
    state: SessionState,
    outcome: PluginOutcome,
    hostname: String,
    now: DateTime<Utc>,
) -> (bool, bool) {
    let Some(session) = scan.sessions.get_mut(index) else {
        return (false, false);
    };
    if !session.advance(state, now) {
        return (false, false);
    }
    match outcome {
        PluginOutcome::Completed(issues) | PluginOutcome::Aborted(issues) => {
            session.issues.extend(issues);
        }
        PluginOutcome::Failed(failure) => {
            let PluginFailure {
                kind,
                message,
                issues,
            } = failure;
            session.issues.extend(issues);
            session.issues.push(failure_issue(&session.plugin.name, kind, &message));
            session.failure = Some(SessionFailure {
                hostname,
                message,
                kind,
            });
        }
    }
    if state != SessionState::Aborted {
        return (true, false);
    }
    for later in scan.sessions.iter_mut().skip(index + 1) {
        if later.state == SessionState::Created {
            later.advance(SessionState::Cancelled, now);
        }
    }
    (true, scan.advance(ScanState::Failed, now))
}

/// Moves scan `id` to FAILED unless it is already terminal, closing its
/// open sessions.
pub(crate) fn mark_scan_failed(store: &dyn ScanStore, id: Uuid) {
    let failed = update_with(store, id, |scan| {
        let now = Utc::now();
        if !scan.advance(ScanState::Failed, now) {
            return false;
        }
        scan.fail_remaining_sessions(now);
        true
    });
    match failed {
        Ok((true, _)) => record_scan_completed(ScanState::Failed),
        Ok((false, _)) => {}
        Err(e) => error!(scan_id = %id, error = %e, "could not mark scan failed"),
    }
}

fn record_scan_completed(state: ScanState) {
    metrics::counter!(m::SCANS_COMPLETED_TOTAL, m::LABEL_STATE => state.to_string()).increment(1);
}

fn local_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_owned())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryScanStore;

    #[test]
    fn failure_issue_is_high() {
        let issue = failure_issue("Alive", FailureKind::Timeout, "took too long");
        assert_eq!(issue.code, FAILURE_CODE);
        assert_eq!(issue.severity, Severity::High);
        assert_eq!(issue.summary, "Alive failed (timeout)");
        assert_eq!(issue.description, "took too long");
    }

    #[test]
    fn hostname_is_never_empty() {
        assert!(!local_hostname().is_empty());
    }

    fn descriptor(id: &str) -> watchpost_core::PluginDescriptor {
        watchpost_core::PluginDescriptor {
            identifier: id.to_owned(),
            name: id.to_owned(),
            version: "0.1".to_owned(),
            weight: Weight::Light,
            mode: watchpost_core::ExecutionMode::Blocking,
        }
    }

    fn three_session_scan() -> Scan {
        let now = Utc::now();
        let sessions = ["alive", "headers", "robots"]
            .into_iter()
            .map(|id| {
                watchpost_core::Session::new(
                    descriptor(id),
                    watchpost_core::Configuration::new(),
                    "",
                    now,
                )
            })
            .collect();
        Scan::new(
            watchpost_core::PlanRef {
                name: "basic".to_owned(),
                revision: 1,
            },
            watchpost_core::Configuration::new(),
            sessions,
            watchpost_core::ScanMeta::default(),
            now,
        )
    }

    fn start_first_session(scan: &mut Scan) {
        let now = Utc::now();
        scan.advance(ScanState::Queued, now);
        scan.advance(ScanState::Started, now);
        scan.sessions[0].advance(SessionState::Queued, now);
        scan.sessions[0].advance(SessionState::Started, now);
    }

    #[test]
    fn abort_fails_scan_and_cancels_later_sessions() {
        let mut scan = three_session_scan();
        start_first_session(&mut scan);

        let outcome = PluginOutcome::Aborted(vec![]);
        let applied = apply_outcome(
            &mut scan,
            0,
            SessionState::Aborted,
            outcome,
            "host".to_owned(),
            Utc::now(),
        );

        assert_eq!(applied, (true, true));
        assert_eq!(scan.state, ScanState::Failed);
        assert_eq!(scan.sessions[1].state, SessionState::Cancelled);
        assert_eq!(scan.sessions[2].state, SessionState::Cancelled);
    }

    #[test]
    fn abort_on_terminal_scan_does_not_fail_it_again() {
        let mut scan = three_session_scan();
        start_first_session(&mut scan);
        scan.advance(ScanState::Stopped, Utc::now());

        let applied = apply_outcome(
            &mut scan,
            0,
            SessionState::Aborted,
            PluginOutcome::Aborted(vec![]),
            "host".to_owned(),
            Utc::now(),
        );

        assert_eq!(applied, (true, false));
        assert_eq!(scan.state, ScanState::Stopped);
    }

    #[test]
    fn failed_outcome_records_failure_issue() {
        let mut scan = three_session_scan();
        start_first_session(&mut scan);

        let applied = apply_outcome(
            &mut scan,
            0,
            SessionState::Failed,
            PluginOutcome::failed(FailureKind::Error, "connection reset"),
            "host".to_owned(),
            Utc::now(),
        );

        assert_eq!(applied, (true, false));
        let session = &scan.sessions[0];
        assert_eq!(session.state, SessionState::Failed);
        assert_eq!(session.issues.last().map(|i| i.code.as_str()), Some(FAILURE_CODE));
        assert_eq!(
            session.failure.as_ref().map(|f| f.hostname.as_str()),
            Some("host")
        );
        assert_eq!(scan.sessions[1].state, SessionState::Created);
    }

    #[test]
    fn mark_scan_failed_closes_open_sessions() {
        let store = MemoryScanStore::new();
        let mut scan = three_session_scan();
        start_first_session(&mut scan);
        scan.sessions[1].advance(SessionState::Queued, Utc::now());
        let id = scan.id;
        store.insert(scan).unwrap();

        mark_scan_failed(&store, id);

        let failed = store.get(id).unwrap().unwrap();
        assert_eq!(failed.state, ScanState::Failed);
        assert_eq!(failed.sessions[0].state, SessionState::Failed);
        assert_eq!(failed.sessions[1].state, SessionState::Failed);
        assert_eq!(failed.sessions[2].state, SessionState::Cancelled);
        assert!(failed.all_sessions_terminal());
    }

    #[test]
    fn mark_scan_failed_leaves_terminal_scan_alone() {
        let store = MemoryScanStore::new();
        let mut scan = three_session_scan();
        scan.advance(ScanState::Stopped, Utc::now());
        let id = scan.id;
        store.insert(scan).unwrap();

        mark_scan_failed(&store, id);

        let stopped = store.get(id).unwrap().unwrap();
        assert_eq!(stopped.state, ScanState::Stopped);
        assert!(stopped.sessions.iter().all(|s| s.state == SessionState::Created));
    }
}

//! Blocking backend -- synchronous checks on tokio's blocking pool.
//!
//! A [`BlockingCheck`] is plain synchronous code. [`BlockingRunner`] adapts
//! it to the async [`Plugin`] contract: the check runs under
//! `spawn_blocking`, a panic becomes `Failed(crashed)` and a hard timeout
//! becomes `Failed(timeout)`.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use watchpost_core::{
    ExecutionMode, FailureKind, Plugin, PluginContext, PluginDescriptor, PluginOutcome, Weight,
};

use crate::http::HttpProbe;

/// Static metadata of a blocking check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub version: &'static str,
    pub weight: Weight,
}

/// Synchronous scanner check.
pub trait BlockingCheck: Send + Sync + 'static {
    fn info(&self) -> CheckInfo;

    /// Runs the check against `ctx.target`.
    fn run(&self, probe: &HttpProbe, ctx: &PluginContext) -> PluginOutcome;
}

/// [`Plugin`] adapter for a [`BlockingCheck`].
pub struct BlockingRunner {
    descriptor: PluginDescriptor,
    check: Arc<dyn BlockingCheck>,
    probe: Arc<HttpProbe>,
    timeout: Duration,
}

impl BlockingRunner {
    /// Wraps `check`; the hard timeout is the probe's connect + total budget.
    pub fn new(check: Arc<dyn BlockingCheck>, probe: Arc<HttpProbe>) -> Self {
        let timeout = probe.budget();
        Self::with_timeout(check, probe, timeout)
    }

    pub fn with_timeout(
        check: Arc<dyn BlockingCheck>,
        probe: Arc<HttpProbe>,
        timeout: Duration,
    ) -> Self {
        let info = check.info();
        Self {
            descriptor: PluginDescriptor {
                identifier: info.id.to_owned(),
                name: info.name.to_owned(),
                version: info.version.to_owned(),
                weight: info.weight,
                mode: ExecutionMode::Blocking,
            },
            check,
            probe,
            timeout,
        }
    }
}

impl Plugin for BlockingRunner {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: PluginContext) -> PluginOutcome {
        let check = Arc::clone(&self.check);
        let probe = Arc::clone(&self.probe);
        let plugin = self.descriptor.identifier.clone();
        let session_id = ctx.session_id;

        let task = tokio::task::spawn_blocking(move || check.run(&probe, &ctx));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(outcome)) => {
                debug!(plugin = %plugin, %session_id, "blocking check returned");
                outcome
            }
            Ok(Err(join_err)) => {
                let message = if join_err.is_panic() {
                    format!("check panicked: {}", panic_message(join_err.into_panic()))
                } else {
                    format!("check task failed: {join_err}")
                };
                warn!(plugin = %plugin, %session_id, message = %message, "blocking check crashed");
                PluginOutcome::failed(FailureKind::Crashed, message)
            }
            Err(_elapsed) => {
                // the blocking thread cannot be interrupted; its result is dropped
                warn!(plugin = %plugin, %session_id, timeout_ms = self.timeout.as_millis() as u64, "blocking check timed out");
                PluginOutcome::failed(
                    FailureKind::Timeout,
                    format!("check did not finish within {:?}", self.timeout),
                )
            }
        }
    }
}

/// Text of a panic payload.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

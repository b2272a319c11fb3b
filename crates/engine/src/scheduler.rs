//! Execution scheduler -- worker pool over the start queue plus a stop
//! handler.
//!
//! ```text
//! submit(id) --> [start queue] --> worker 1..N --> ScanExecutor::run_scan
//! signal_stop(id) --> [stop queue] --> stop task --> ScanExecutor::stop_scan
//! ```
//!
//! The stop queue is separate from the start queue, so a STOP is handled
//! while every worker is busy with a long scan. Shutdown cancels a shared
//! token; a worker finishes the scan in hand and exits.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use watchpost_core::SchedulerError;
use watchpost_core::config::SchedulerConfig;

use crate::executor::ScanExecutor;

/// Worker pool driving queued scans.
pub struct Scheduler {
    start_tx: mpsc::Sender<Uuid>,
    stop_tx: mpsc::UnboundedSender<Uuid>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Spawns `config.workers` workers and the stop handler.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(executor: Arc<ScanExecutor>, config: &SchedulerConfig) -> Self {
        let (start_tx, start_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let start_rx = Arc::new(Mutex::new(start_rx));

        let mut tasks = Vec::with_capacity(config.workers + 1);
        for worker in 0..config.workers.max(1) {
            tasks.push(tokio::spawn(run_worker(
                worker,
                Arc::clone(&start_rx),
                Arc::clone(&executor),
                cancel.clone(),
            )));
        }
        tasks.push(tokio::spawn(run_stop_handler(
            stop_rx,
            Arc::clone(&executor),
            cancel.clone(),
        )));

        info!(
            workers = config.workers.max(1),
            queue_capacity = config.queue_capacity,
            "scheduler started"
        );

        Self {
            start_tx,
            stop_tx,
            cancel,
            tasks: Mutex::new(tasks),
        }
    }

    /// Enqueues a scan that is already QUEUED in the store.
    pub fn submit(&self, id: Uuid) -> Result<(), SchedulerError> {
        if self.cancel.is_cancelled() {
            return Err(SchedulerError::ShutDown);
        }
        self.start_tx.try_send(id).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                SchedulerError::QueueUnavailable("start queue is full".to_owned())
            }
            mpsc::error::TrySendError::Closed(_) => SchedulerError::ShutDown,
        })?;
        debug!(scan_id = %id, "scan submitted");
        Ok(())
    }

    /// Asks the stop handler to stop a scan that is already STOPPING.
    pub fn signal_stop(&self, id: Uuid) -> Result<(), SchedulerError> {
        if self.cancel.is_cancelled() {
            return Err(SchedulerError::ShutDown);
        }
        self.stop_tx
            .send(id)
            .map_err(|_| SchedulerError::ShutDown)?;
        debug!(scan_id = %id, "stop signalled");
        Ok(())
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stops accepting work and waits for every task to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "scheduler task ended abnormally");
            }
        }
        info!("scheduler stopped");
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("shut_down", &self.cancel.is_cancelled())
            .finish()
    }
}

async fn run_worker(
    worker: usize,
    queue: Arc<Mutex<mpsc::Receiver<Uuid>>>,
    executor: Arc<ScanExecutor>,
    cancel: CancellationToken,
) {
    debug!(worker, "worker started");
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            id = async { queue.lock().await.recv().await } => id,
        };
        let Some(id) = next else {
            break;
        };
        debug!(worker, scan_id = %id, "worker picked up scan");
        executor.run_scan(id).await;
    }
    debug!(worker, "worker stopped");
}

async fn run_stop_handler(
    mut queue: mpsc::UnboundedReceiver<Uuid>,
    executor: Arc<ScanExecutor>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            id = queue.recv() => match id {
                Some(id) => executor.stop_scan(id),
                None => break,
            },
        }
    }
    // stops accepted before shutdown still land
    while let Ok(id) = queue.try_recv() {
        executor.stop_scan(id);
    }
}

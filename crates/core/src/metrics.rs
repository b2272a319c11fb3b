//! Metric names and descriptions.
//!
//! Components call `metrics::counter!()`, `gauge!()` and `histogram!()`
//! with these constants. No recorder is installed here; the embedding
//! process chooses one.
//!
//! # Naming
//!
//! - prefix: `watchpost_`
//! - suffix: `_total` (counter), `_seconds` (histogram), none (gauge)

// ─── Label keys ──────────────────────────────────────────────────────

/// Terminal state label key
pub const LABEL_STATE: &str = "state";

/// Plugin identifier label key
pub const LABEL_PLUGIN: &str = "plugin";

// ─── Orchestrator ────────────────────────────────────────────────────

/// Scans created (counter)
pub const SCANS_CREATED_TOTAL: &str = "watchpost_scans_created_total";

/// Scans that reached a terminal state (counter, label: state)
pub const SCANS_COMPLETED_TOTAL: &str = "watchpost_scans_completed_total";

// ─── Scheduler ───────────────────────────────────────────────────────

/// Sessions that reached a terminal state (counter, labels: state, plugin)
pub const SESSIONS_COMPLETED_TOTAL: &str = "watchpost_sessions_completed_total";

/// Plugin execution time (histogram, seconds, label: plugin)
pub const PLUGIN_DURATION_SECONDS: &str = "watchpost_plugin_duration_seconds";

/// Scans currently driven by a worker (gauge)
pub const SCHEDULER_ACTIVE_SCANS: &str = "watchpost_scheduler_active_scans";

/// Plugin duration buckets (seconds)
///
/// 10ms to 15min: single-request checks up to long external scanners.
pub const PLUGIN_DURATION_BUCKETS: [f64; 10] =
    [0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0];

/// Registers descriptions for every metric.
///
/// Call once after the global recorder is installed.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(SCANS_CREATED_TOTAL, "Total number of scans created");
    describe_counter!(
        SCANS_COMPLETED_TOTAL,
        "Total number of scans that reached a terminal state, by state"
    );
    describe_counter!(
        SESSIONS_COMPLETED_TOTAL,
        "Total number of sessions that reached a terminal state, by state and plugin"
    );
    describe_histogram!(
        PLUGIN_DURATION_SECONDS,
        "Plugin execution time in seconds"
    );
    describe_gauge!(
        SCHEDULER_ACTIVE_SCANS,
        "Number of scans currently driven by a scheduler worker"
    );
}

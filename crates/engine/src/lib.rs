//! Watchpost engine -- plugin registry, plan catalog, scan orchestration,
//! scheduling and issue reports.
//!
//! # Architecture
//! ```text
//! ScanOrchestrator --create/START/STOP--> ScanStore <--transitions-- ScanExecutor
//!         |                                   ^                           ^
//!         +------------submit/stop--------> Scheduler (workers + stop task)
//!                                             |
//! Reports ---------------read-only------------+
//! ```
//!
//! [`Engine`] builds and connects every part.

pub mod aggregate;
pub mod catalog;
pub mod engine;
pub mod executor;
pub mod merge;
pub mod orchestrator;
pub mod registry;
pub mod scheduler;
pub mod store;

pub use aggregate::{
    IssueCounts, IssueEntry, Reports, ScanSummary, SessionSummary, StatusEntry, TargetIssues,
    summarize,
};
pub use catalog::{Plan, PlanCatalog, PlanSummary, ResolvedPlan, ResolvedStep, Step};
pub use engine::{Engine, EngineBuilder};
pub use executor::{FAILURE_CODE, ScanExecutor};
pub use merge::deep_merge;
pub use orchestrator::{ScanCommand, ScanOrchestrator};
pub use registry::PluginRegistry;
pub use scheduler::Scheduler;
pub use store::{MemoryScanStore, ScanStore};

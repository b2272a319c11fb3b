//! Engine -- wires registry, catalog, store, scheduler and orchestrator.
//!
//! # Usage
//! ```ignore
//! use watchpost_engine::Engine;
//!
//! let engine = Engine::builder().config(config).build().await?;
//! let scan = engine.orchestrator().create("basic", configuration)?;
//! engine.orchestrator().control(scan.id, "START")?;
//! ```

use std::sync::Arc;

use tracing::info;
use watchpost_core::{DynPlugin, WatchpostConfig, WatchpostError};

use crate::aggregate::Reports;
use crate::catalog::{Plan, PlanCatalog};
use crate::executor::ScanExecutor;
use crate::orchestrator::ScanOrchestrator;
use crate::registry::PluginRegistry;
use crate::scheduler::Scheduler;
use crate::store::{MemoryScanStore, ScanStore};

/// Running scan engine.
pub struct Engine {
    config: WatchpostConfig,
    registry: Arc<PluginRegistry>,
    catalog: Arc<PlanCatalog>,
    scheduler: Arc<Scheduler>,
    orchestrator: ScanOrchestrator,
    reports: Reports,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &WatchpostConfig {
        &self.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub fn orchestrator(&self) -> &ScanOrchestrator {
        &self.orchestrator
    }

    pub fn reports(&self) -> &Reports {
        &self.reports
    }

    /// Stops the scheduler; running scans finish their current work first.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("catalog", &self.catalog)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

/// Engine builder
///
/// Plugins added with [`plugin`](Self::plugin) are registered next to the
/// configured ones; [`plans`](Self::plans) replaces the configured catalog.
pub struct EngineBuilder {
    config: WatchpostConfig,
    store: Option<Arc<dyn ScanStore>>,
    plugins: Vec<Arc<dyn DynPlugin>>,
    plans: Option<Vec<Plan>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: WatchpostConfig::default(),
            store: None,
            plugins: Vec::new(),
            plans: None,
        }
    }

    pub fn config(mut self, config: WatchpostConfig) -> Self {
        self.config = config;
        self
    }

    /// Scan store to use instead of a fresh [`MemoryScanStore`].
    pub fn store(mut self, store: Arc<dyn ScanStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn DynPlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn plans(mut self, plans: Vec<Plan>) -> Self {
        self.plans = Some(plans);
        self
    }

    /// Builds the engine and starts the scheduler.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn build(self) -> Result<Engine, WatchpostError> {
        self.config.validate()?;

        let mut registry = PluginRegistry::from_config(&self.config.plugins, &self.config.http)?;
        for plugin in self.plugins {
            registry.register(plugin)?;
        }
        let registry = Arc::new(registry);

        let catalog = match self.plans {
            Some(plans) => PlanCatalog::new(plans, Arc::clone(&registry))?,
            None => PlanCatalog::load(&self.config.plans, Arc::clone(&registry)).await?,
        };
        let catalog = Arc::new(catalog);

        let store: Arc<dyn ScanStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryScanStore::new()),
        };
        let executor = Arc::new(ScanExecutor::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            &self.config.scheduler,
        ));
        let scheduler = Arc::new(Scheduler::start(executor, &self.config.scheduler));
        let orchestrator =
            ScanOrchestrator::new(Arc::clone(&catalog), Arc::clone(&store), Arc::clone(&scheduler));
        let reports = Reports::new(store, self.config.reports.history_limit)
            .with_plans(catalog.list().into_iter().map(|p| p.name));

        info!(
            plugins = registry.len(),
            plans = catalog.len(),
            "engine ready"
        );

        Ok(Engine {
            config: self.config,
            registry,
            catalog,
            scheduler,
            orchestrator,
            reports,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

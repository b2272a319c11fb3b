//! Plan catalog -- named workflow templates.
//!
//! Plans are loaded once (built-in `plans/default.toml` or the file named
//! by `[plans] path`) and only read afterwards. Retrieval resolves every
//! step's plugin id against the registry and embeds the descriptor as it
//! is at that moment.
//!
//! # Plan file format
//! ```toml
//! [[plans]]
//! name = "basic"
//! description = "Run basic tests"
//!
//! [[plans.workflow]]
//! plugin = "alive"
//! description = "Test if the site is alive"
//! [plans.workflow.configuration]
//! follow_redirects = true
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use watchpost_core::config::PlansConfig;
use watchpost_core::{
    CatalogError, ConfigError, Configuration, PlanRef, PluginDescriptor, WatchpostError,
};

use crate::registry::PluginRegistry;

/// Plans compiled into the binary.
pub const DEFAULT_PLANS: &str = include_str!("../plans/default.toml");

// ─── Plan Definitions ────────────────────────────────────────────────

/// Plan step as written in a plan file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Plugin identifier
    pub plugin: String,
    #[serde(default)]
    pub description: String,
    /// Base configuration; the scan request is merged over it
    #[serde(default)]
    pub configuration: Configuration,
}

/// Plan as written in a plan file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "first_revision")]
    pub revision: u32,
    #[serde(default)]
    pub workflow: Vec<Step>,
}

fn first_revision() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct PlanFile {
    #[serde(default)]
    plans: Vec<Plan>,
}

/// Step with its plugin descriptor resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedStep {
    pub plugin: PluginDescriptor,
    pub description: String,
    pub configuration: Configuration,
}

/// Plan with every step resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPlan {
    pub name: String,
    pub description: String,
    pub revision: u32,
    pub workflow: Vec<ResolvedStep>,
}

impl ResolvedPlan {
    /// Snapshot reference stored on scans.
    pub fn plan_ref(&self) -> PlanRef {
        PlanRef {
            name: self.name.clone(),
            revision: self.revision,
        }
    }
}

/// Listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub name: String,
    pub description: String,
    pub revision: u32,
    /// Plugin ids in workflow order
    pub plugins: Vec<String>,
}

// ─── Catalog ─────────────────────────────────────────────────────────

/// Read-only set of plans.
#[derive(Debug)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
    registry: Arc<PluginRegistry>,
}

impl PlanCatalog {
    /// Builds a catalog, rejecting duplicate plan names.
    pub fn new(plans: Vec<Plan>, registry: Arc<PluginRegistry>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for plan in &plans {
            if !seen.insert(plan.name.as_str()) {
                return Err(CatalogError::DuplicatePlan {
                    name: plan.name.clone(),
                });
            }
            for step in &plan.workflow {
                if registry.lookup(&step.plugin).is_none() {
                    warn!(plan = %plan.name, plugin = %step.plugin, "plan references an unregistered plugin");
                }
            }
        }
        Ok(Self { plans, registry })
    }

    /// Catalog of the built-in plans.
    pub fn builtin(registry: Arc<PluginRegistry>) -> Result<Self, CatalogError> {
        Self::new(Self::parse(DEFAULT_PLANS)?, registry)
    }

    /// Loads plans from a TOML file.
    pub async fn from_file(
        path: impl AsRef<Path>,
        registry: Arc<PluginRegistry>,
    ) -> Result<Self, WatchpostError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WatchpostError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                WatchpostError::Io(e)
            }
        })?;
        let catalog = Self::new(Self::parse(&content)?, registry)?;
        info!(path = %path.display(), plans = catalog.plans.len(), "loaded plans");
        Ok(catalog)
    }

    /// Built-in plans unless `config.path` names a file.
    pub async fn load(
        config: &PlansConfig,
        registry: Arc<PluginRegistry>,
    ) -> Result<Self, WatchpostError> {
        if config.path.is_empty() {
            Ok(Self::builtin(registry)?)
        } else {
            Self::from_file(&config.path, registry).await
        }
    }

    /// Parses a plan file.
    pub fn parse(toml_str: &str) -> Result<Vec<Plan>, CatalogError> {
        toml::from_str::<PlanFile>(toml_str)
            .map(|file| file.plans)
            .map_err(|e| CatalogError::ParseFailed {
                reason: e.to_string(),
            })
    }

    /// Plan `name` with resolved steps, `None` if there is no such plan.
    pub fn get(&self, name: &str) -> Result<Option<ResolvedPlan>, CatalogError> {
        let Some(plan) = self.plans.iter().find(|p| p.name == name) else {
            return Ok(None);
        };

        let workflow = plan
            .workflow
            .iter()
            .map(|step| {
                let descriptor =
                    self.registry
                        .lookup(&step.plugin)
                        .ok_or_else(|| CatalogError::UnknownPlugin {
                            plan: plan.name.clone(),
                            plugin: step.plugin.clone(),
                        })?;
                Ok(ResolvedStep {
                    plugin: descriptor.clone(),
                    description: step.description.clone(),
                    configuration: step.configuration.clone(),
                })
            })
            .collect::<Result<Vec<_>, CatalogError>>()?;

        Ok(Some(ResolvedPlan {
            name: plan.name.clone(),
            description: plan.description.clone(),
            revision: plan.revision,
            workflow,
        }))
    }

    /// Summaries in file order.
    pub fn list(&self) -> Vec<PlanSummary> {
        self.plans
            .iter()
            .map(|p| PlanSummary {
                name: p.name.clone(),
                description: p.description.clone(),
                revision: p.revision,
                plugins: p.workflow.iter().map(|s| s.plugin.clone()).collect(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

//! Plugin registry -- process-wide table of executable plugins.
//!
//! Built once at startup from the static built-in table plus configured
//! external programs, then shared read-only behind an `Arc`.
//!
//! - required built-ins are always registered; a failure is fatal
//! - optional entries (`plugins.optional`, `[[plugins.external]]`) that
//!   cannot be loaded are skipped with a warning

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use watchpost_core::config::{HttpConfig, PluginsConfig};
use watchpost_core::{DynPlugin, PluginDescriptor, PluginError};
use watchpost_plugins::{BuiltinCheck, ExternalProcessPlugin, HttpProbe};

/// Immutable plugin table keyed by identifier.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Arc<dyn DynPlugin>>,
}

impl PluginRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the required built-ins and every loadable optional
    /// plugin named in `config`.
    pub fn from_config(plugins: &PluginsConfig, http: &HttpConfig) -> Result<Self, PluginError> {
        let mut registry = Self::new();
        let probe = Arc::new(HttpProbe::new(http));

        for check in BuiltinCheck::ALL.into_iter().filter(|c| c.required()) {
            registry
                .register(check.instantiate(Arc::clone(&probe)))
                .map_err(|e| PluginError::RequiredUnavailable {
                    id: check.id().to_owned(),
                    reason: e.to_string(),
                })?;
        }

        for id in &plugins.optional {
            let loaded = match BuiltinCheck::from_id(id) {
                Some(check) => registry.register(check.instantiate(Arc::clone(&probe))),
                None => Err(PluginError::Unavailable {
                    id: id.clone(),
                    reason: "not a built-in plugin".to_owned(),
                }),
            };
            registry.skip_on_error(id, loaded);
        }

        for external in &plugins.external {
            let loaded = ExternalProcessPlugin::from_config(external)
                .and_then(|plugin| registry.register(Arc::new(plugin)));
            registry.skip_on_error(&external.id, loaded);
        }

        info!(plugins = registry.len(), "plugin registry built");
        Ok(registry)
    }

    fn skip_on_error(&self, id: &str, result: Result<(), PluginError>) {
        match result {
            Ok(()) => debug!(plugin = id, "optional plugin registered"),
            Err(e) => warn!(plugin = id, error = %e, "skipping optional plugin"),
        }
    }

    /// Adds a plugin under its descriptor's identifier.
    pub fn register(&mut self, plugin: Arc<dyn DynPlugin>) -> Result<(), PluginError> {
        let id = plugin.descriptor().identifier.clone();
        if self.plugins.contains_key(&id) {
            return Err(PluginError::AlreadyRegistered { id });
        }
        self.plugins.insert(id, plugin);
        Ok(())
    }

    /// Descriptor for `id`, if registered.
    pub fn lookup(&self, id: &str) -> Option<&PluginDescriptor> {
        self.plugins.get(id).map(|p| p.descriptor())
    }

    /// Every registered descriptor, ordered by identifier.
    pub fn descriptors(&self) -> Vec<PluginDescriptor> {
        self.plugins.values().map(|p| p.descriptor().clone()).collect()
    }

    /// Executable handle for `id`.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn DynPlugin>, PluginError> {
        self.plugins
            .get(id)
            .cloned()
            .ok_or_else(|| PluginError::NoSuchPlugin { id: id.to_owned() })
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

//! Control-plane registry.
//!
//! [`Model`] owns two independent namespaces, plugins and pipelines, each a
//! map from name to `{spec, instance}`. Writers (add / update / dismiss /
//! delete) are serialised by one writer lock and build new instances before
//! touching the maps, so readers (spec lookups, listings, and every
//! data-plane request resolving a stage) only ever contend for the instant a
//! map entry is inserted, swapped or removed.
//!
//! Lifecycle of a name:
//!
//! ```text
//!   add ──► update* ──► dismiss ──► delete
//!            (reconfigure,  (dispose warm   (remove entry; rejected while
//!             warm state     state, once)    referenced or not dismissed)
//!             kept)
//! ```

use crate::error::{GatewayError, GatewayResult, Namespace};
use crate::pipeline::builtin_pipeline_factories;
use crate::plugin::builtin_stage_factories;
use parking_lot::{Mutex, MutexGuard, RwLock};
use pipegate_kernel::{
    KernelError, Pipeline, PipelineFactory, PipelineOutcome, PipelineSpec, PluginCatalog,
    PluginSpec, Stage, StageContext, StageFactory,
};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct PluginEntry {
    spec: PluginSpec,
    instance: Arc<dyn Stage>,
    results: &'static [&'static str],
    dismissed: bool,
}

struct PipelineEntry {
    spec: PipelineSpec,
    instance: Arc<dyn Pipeline>,
    dismissed: bool,
}

/// Name and type filter for list operations.
#[derive(Debug, Default)]
pub struct ListFilter {
    name_pattern: Option<Regex>,
    types: Vec<String>,
}

impl ListFilter {
    /// `name_pattern` is a regular expression matched anywhere in the name;
    /// an empty `types` accepts every type.
    pub fn new(name_pattern: Option<&str>, types: Vec<String>) -> GatewayResult<Self> {
        let name_pattern = match name_pattern.filter(|p| !p.is_empty()) {
            Some(pattern) => Some(
                Regex::new(pattern)
                    .map_err(|e| GatewayError::InvalidFilter(format!("name pattern: {e}")))?,
            ),
            None => None,
        };
        Ok(Self {
            name_pattern,
            types,
        })
    }

    fn matches(&self, name: &str, kind: &str) -> bool {
        self.name_pattern.as_ref().is_none_or(|re| re.is_match(name))
            && (self.types.is_empty() || self.types.iter().any(|t| t == kind))
    }
}

/// The control-plane registry of plugins and pipelines.
pub struct Model {
    stage_factories: BTreeMap<String, Arc<dyn StageFactory>>,
    pipeline_factories: BTreeMap<String, Arc<dyn PipelineFactory>>,
    plugins: RwLock<HashMap<String, PluginEntry>>,
    pipelines: RwLock<HashMap<String, PipelineEntry>>,
    writer: Mutex<()>,
}

impl Model {
    /// Create an empty registry that knows the given plugin and pipeline
    /// types. A type registered twice keeps the last factory.
    pub fn new(
        stage_factories: Vec<Arc<dyn StageFactory>>,
        pipeline_factories: Vec<Arc<dyn PipelineFactory>>,
    ) -> Self {
        let mut stages = BTreeMap::new();
        for factory in stage_factories {
            if stages.insert(factory.kind().to_string(), factory.clone()).is_some() {
                warn!(plugin_type = factory.kind(), "plugin type registered twice");
            }
        }
        let mut pipelines = BTreeMap::new();
        for factory in pipeline_factories {
            if pipelines.insert(factory.kind().to_string(), factory.clone()).is_some() {
                warn!(pipeline_type = factory.kind(), "pipeline type registered twice");
            }
        }

        Self {
            stage_factories: stages,
            pipeline_factories: pipelines,
            plugins: RwLock::new(HashMap::new()),
            pipelines: RwLock::new(HashMap::new()),
            writer: Mutex::new(()),
        }
    }

    /// Registry with every built-in plugin and pipeline type.
    pub fn with_builtins() -> Self {
        Self::new(builtin_stage_factories(), builtin_pipeline_factories())
    }

    fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writer.lock()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Types
    // ─────────────────────────────────────────────────────────────────────────

    /// Sorted, duplicate-free plugin type names.
    pub fn plugin_types(&self) -> Vec<String> {
        self.stage_factories.keys().cloned().collect()
    }

    /// Sorted, duplicate-free pipeline type names.
    pub fn pipeline_types(&self) -> Vec<String> {
        self.pipeline_factories.keys().cloned().collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Plugins
    // ─────────────────────────────────────────────────────────────────────────

    pub fn add_plugin(&self, kind: &str, config: Value) -> GatewayResult<()> {
        let spec = PluginSpec::from_payload(kind, config)?;
        let factory = self
            .stage_factories
            .get(kind)
            .ok_or_else(|| KernelError::UnknownPluginType(kind.to_string()))?;

        let _writer = self.write_lock();
        if self.plugins.read().contains_key(&spec.name) {
            return Err(GatewayError::AlreadyExists(Namespace::Plugin, spec.name));
        }

        let instance = factory.create(&spec)?;
        let name = spec.name.clone();
        self.plugins.write().insert(
            name.clone(),
            PluginEntry {
                spec,
                instance,
                results: factory.results(),
                dismissed: false,
            },
        );
        info!(plugin = %name, plugin_type = kind, "plugin created");
        Ok(())
    }

    pub fn plugin_spec(&self, name: &str) -> GatewayResult<PluginSpec> {
        self.plugins
            .read()
            .get(name)
            .map(|entry| entry.spec.clone())
            .ok_or_else(|| GatewayError::NotFound(Namespace::Plugin, name.to_string()))
    }

    /// Specs matching `filter`, sorted by name.
    pub fn list_plugins(&self, filter: &ListFilter) -> Vec<PluginSpec> {
        let mut specs: Vec<PluginSpec> = self
            .plugins
            .read()
            .values()
            .filter(|entry| filter.matches(&entry.spec.name, &entry.spec.kind))
            .map(|entry| entry.spec.clone())
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Status document of a live plugin; `Value::Null` if the type exposes
    /// none. A dismissed plugin has no warm state left to report.
    pub fn plugin_status(&self, name: &str) -> GatewayResult<Value> {
        let instance = match self.plugins.read().get(name) {
            None => return Err(GatewayError::NotFound(Namespace::Plugin, name.to_string())),
            Some(entry) if entry.dismissed => {
                return Err(GatewayError::Dismissed(Namespace::Plugin, name.to_string()));
            }
            Some(entry) => entry.instance.clone(),
        };
        Ok(instance.status().unwrap_or(Value::Null))
    }

    /// Reconfigure a plugin in place. The current instance hands its warm
    /// state to the successor, which then replaces it atomically.
    pub fn update_plugin(&self, kind: &str, config: Value) -> GatewayResult<()> {
        let spec = PluginSpec::from_payload(kind, config)?;

        let _writer = self.write_lock();
        let current = {
            let plugins = self.plugins.read();
            let entry = plugins
                .get(&spec.name)
                .ok_or_else(|| GatewayError::NotFound(Namespace::Plugin, spec.name.clone()))?;
            if entry.spec.kind != spec.kind {
                return Err(GatewayError::ImmutableType {
                    namespace: Namespace::Plugin,
                    name: spec.name.clone(),
                    stored: entry.spec.kind.clone(),
                    requested: spec.kind.clone(),
                });
            }
            if entry.dismissed {
                return Err(GatewayError::Dismissed(Namespace::Plugin, spec.name.clone()));
            }
            entry.instance.clone()
        };

        let successor = current.reconfigure(&spec)?;
        let name = spec.name.clone();
        if let Some(entry) = self.plugins.write().get_mut(&name) {
            entry.spec = spec;
            entry.instance = successor;
        }
        info!(plugin = %name, plugin_type = kind, "plugin config updated");
        Ok(())
    }

    /// Dispose the plugin's warm state. Dismissing an already-dismissed
    /// plugin succeeds without touching it again.
    pub fn dismiss_plugin(&self, name: &str) -> GatewayResult<()> {
        let _writer = self.write_lock();
        self.dismiss_plugin_locked(name)
    }

    fn dismiss_plugin_locked(&self, name: &str) -> GatewayResult<()> {
        let instance = {
            let plugins = self.plugins.read();
            let entry = plugins
                .get(name)
                .ok_or_else(|| GatewayError::NotFound(Namespace::Plugin, name.to_string()))?;
            if entry.dismissed {
                debug!(plugin = %name, "plugin already dismissed");
                return Ok(());
            }
            entry.instance.clone()
        };

        instance.dispose()?;
        if let Some(entry) = self.plugins.write().get_mut(name) {
            entry.dismissed = true;
        }
        info!(plugin = %name, "plugin dismissed");
        Ok(())
    }

    /// Remove a dismissed, unreferenced plugin.
    pub fn delete_plugin(&self, name: &str) -> GatewayResult<()> {
        let _writer = self.write_lock();
        self.delete_plugin_locked(name)
    }

    fn delete_plugin_locked(&self, name: &str) -> GatewayResult<()> {
        let dismissed = self
            .plugins
            .read()
            .get(name)
            .map(|entry| entry.dismissed)
            .ok_or_else(|| GatewayError::NotFound(Namespace::Plugin, name.to_string()))?;
        self.ensure_unreferenced(name)?;
        if !dismissed {
            return Err(GatewayError::NotDismissed(Namespace::Plugin, name.to_string()));
        }

        self.plugins.write().remove(name);
        info!(plugin = %name, "plugin deleted");
        Ok(())
    }

    /// Reference check, dismiss and delete as one write operation. A
    /// referenced plugin is rejected before its warm state is touched.
    pub fn retire_plugin(&self, name: &str) -> GatewayResult<()> {
        let _writer = self.write_lock();
        if !self.plugins.read().contains_key(name) {
            return Err(GatewayError::NotFound(Namespace::Plugin, name.to_string()));
        }
        self.ensure_unreferenced(name)?;
        self.dismiss_plugin_locked(name)?;
        self.delete_plugin_locked(name)
    }

    /// Pipelines referencing `plugin`, sorted.
    pub fn referencing_pipelines(&self, plugin: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .pipelines
            .read()
            .values()
            .filter(|entry| entry.instance.plugin_names().iter().any(|p| p == plugin))
            .map(|entry| entry.spec.name.clone())
            .collect();
        names.sort();
        names
    }

    fn ensure_unreferenced(&self, plugin: &str) -> GatewayResult<()> {
        let pipelines = self.referencing_pipelines(plugin);
        if pipelines.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::Referenced {
                name: plugin.to_string(),
                pipelines,
            })
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pipelines
    // ─────────────────────────────────────────────────────────────────────────

    pub fn add_pipeline(&self, kind: &str, config: Value) -> GatewayResult<()> {
        let spec = PipelineSpec::from_payload(kind, config)?;
        let factory = self
            .pipeline_factories
            .get(kind)
            .ok_or_else(|| KernelError::UnknownPipelineType(kind.to_string()))?;

        let _writer = self.write_lock();
        if self.pipelines.read().contains_key(&spec.name) {
            return Err(GatewayError::AlreadyExists(Namespace::Pipeline, spec.name));
        }

        let instance = factory.create(&spec, self)?;
        let name = spec.name.clone();
        self.pipelines.write().insert(
            name.clone(),
            PipelineEntry {
                spec,
                instance,
                dismissed: false,
            },
        );
        info!(pipeline = %name, pipeline_type = kind, "pipeline created");
        Ok(())
    }

    pub fn pipeline_spec(&self, name: &str) -> GatewayResult<PipelineSpec> {
        self.pipelines
            .read()
            .get(name)
            .map(|entry| entry.spec.clone())
            .ok_or_else(|| GatewayError::NotFound(Namespace::Pipeline, name.to_string()))
    }

    pub fn list_pipelines(&self, filter: &ListFilter) -> Vec<PipelineSpec> {
        let mut specs: Vec<PipelineSpec> = self
            .pipelines
            .read()
            .values()
            .filter(|entry| filter.matches(&entry.spec.name, &entry.spec.kind))
            .map(|entry| entry.spec.clone())
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn update_pipeline(&self, kind: &str, config: Value) -> GatewayResult<()> {
        let spec = PipelineSpec::from_payload(kind, config)?;

        let _writer = self.write_lock();
        let current = {
            let pipelines = self.pipelines.read();
            let entry = pipelines
                .get(&spec.name)
                .ok_or_else(|| GatewayError::NotFound(Namespace::Pipeline, spec.name.clone()))?;
            if entry.spec.kind != spec.kind {
                return Err(GatewayError::ImmutableType {
                    namespace: Namespace::Pipeline,
                    name: spec.name.clone(),
                    stored: entry.spec.kind.clone(),
                    requested: spec.kind.clone(),
                });
            }
            if entry.dismissed {
                return Err(GatewayError::Dismissed(Namespace::Pipeline, spec.name.clone()));
            }
            entry.instance.clone()
        };

        let successor = current.reconfigure(&spec, self)?;
        let name = spec.name.clone();
        if let Some(entry) = self.pipelines.write().get_mut(&name) {
            entry.spec = spec;
            entry.instance = successor;
        }
        info!(pipeline = %name, pipeline_type = kind, "pipeline config updated");
        Ok(())
    }

    pub fn dismiss_pipeline(&self, name: &str) -> GatewayResult<()> {
        let _writer = self.write_lock();
        self.dismiss_pipeline_locked(name)
    }

    fn dismiss_pipeline_locked(&self, name: &str) -> GatewayResult<()> {
        let instance = {
            let pipelines = self.pipelines.read();
            let entry = pipelines
                .get(name)
                .ok_or_else(|| GatewayError::NotFound(Namespace::Pipeline, name.to_string()))?;
            if entry.dismissed {
                debug!(pipeline = %name, "pipeline already dismissed");
                return Ok(());
            }
            entry.instance.clone()
        };

        instance.dispose()?;
        if let Some(entry) = self.pipelines.write().get_mut(name) {
            entry.dismissed = true;
        }
        info!(pipeline = %name, "pipeline dismissed");
        Ok(())
    }

    pub fn delete_pipeline(&self, name: &str) -> GatewayResult<()> {
        let _writer = self.write_lock();
        self.delete_pipeline_locked(name)
    }

    fn delete_pipeline_locked(&self, name: &str) -> GatewayResult<()> {
        let mut pipelines = self.pipelines.write();
        match pipelines.get(name) {
            None => Err(GatewayError::NotFound(Namespace::Pipeline, name.to_string())),
            Some(entry) if !entry.dismissed => {
                Err(GatewayError::NotDismissed(Namespace::Pipeline, name.to_string()))
            }
            Some(_) => {
                pipelines.remove(name);
                info!(pipeline = %name, "pipeline deleted");
                Ok(())
            }
        }
    }

    /// Dismiss and delete as one write operation.
    pub fn retire_pipeline(&self, name: &str) -> GatewayResult<()> {
        let _writer = self.write_lock();
        self.dismiss_pipeline_locked(name)?;
        self.delete_pipeline_locked(name)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Data plane
    // ─────────────────────────────────────────────────────────────────────────

    /// Run one request through a live pipeline.
    pub async fn run_pipeline(
        &self,
        name: &str,
        ctx: &mut StageContext,
    ) -> GatewayResult<PipelineOutcome> {
        let pipeline = self
            .pipelines
            .read()
            .get(name)
            .filter(|entry| !entry.dismissed)
            .map(|entry| entry.instance.clone())
            .ok_or_else(|| GatewayError::NotFound(Namespace::Pipeline, name.to_string()))?;

        Ok(pipeline.run(self, ctx).await)
    }
}

impl PluginCatalog for Model {
    fn plugin(&self, name: &str) -> Option<Arc<dyn Stage>> {
        self.plugins
            .read()
            .get(name)
            .filter(|entry| !entry.dismissed)
            .map(|entry| entry.instance.clone())
    }

    fn plugin_results(&self, name: &str) -> Option<&'static [&'static str]> {
        self.plugins
            .read()
            .get(name)
            .filter(|entry| !entry.dismissed)
            .map(|entry| entry.results)
    }
}

//! `LinearPipeline`: stages run in declaration order.
//!
//! A stage returning [`StageResult::Continue`] hands over to the next one. A
//! named result is looked up in `jump_if` for that stage: it either jumps
//! forward to a later stage or to `END`; an unmapped result ends the run.

use async_trait::async_trait;
use pipegate_kernel::{
    KernelError, KernelResult, Pipeline, PipelineFactory, PipelineOutcome, PipelineSpec,
    PluginCatalog, StageContext, StageResult,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

pub const KIND: &str = "LinearPipeline";

/// Jump target meaning "stop the pipeline".
pub const END: &str = "END";

/// Result recorded when a referenced plugin vanished between validation and
/// execution.
pub const RESULT_PLUGIN_UNAVAILABLE: &str = "pluginUnavailable";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearPipelineConfig {
    pub name: String,
    pub plugins: Vec<String>,
    /// plugin → (result → target plugin or `END`)
    #[serde(default)]
    pub jump_if: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Jump {
    To(usize),
    End,
}

#[derive(Debug)]
pub struct LinearPipeline {
    name: String,
    plugins: Vec<String>,
    /// Indexed like `plugins`.
    jumps: Vec<HashMap<String, Jump>>,
}

impl LinearPipeline {
    pub fn new(spec: &PipelineSpec, catalog: &dyn PluginCatalog) -> KernelResult<Self> {
        let config: LinearPipelineConfig = spec.decode()?;
        if config.plugins.is_empty() {
            return Err(KernelError::invalid_field(
                "plugins",
                "must list at least one plugin",
            ));
        }

        let mut seen = HashSet::new();
        for plugin in &config.plugins {
            if plugin == END {
                return Err(KernelError::invalid_field(
                    "plugins",
                    format!("'{END}' is reserved as a jump target"),
                ));
            }
            if !seen.insert(plugin.as_str()) {
                return Err(KernelError::invalid_field(
                    "plugins",
                    format!("plugin '{plugin}' listed twice"),
                ));
            }
        }

        let position: HashMap<&str, usize> = config
            .plugins
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.as_str(), idx))
            .collect();

        let mut declared = Vec::with_capacity(config.plugins.len());
        for plugin in &config.plugins {
            let results = catalog
                .plugin_results(plugin)
                .ok_or_else(|| KernelError::UnknownPlugin {
                    pipeline: config.name.clone(),
                    plugin: plugin.clone(),
                })?;
            declared.push(results);
        }

        let mut jumps = vec![HashMap::new(); config.plugins.len()];
        for (from, mapping) in &config.jump_if {
            let from_idx = *position.get(from.as_str()).ok_or_else(|| {
                KernelError::invalid_field(
                    "jump_if",
                    format!("plugin '{from}' is not part of the pipeline"),
                )
            })?;
            for (result, target) in mapping {
                if !declared[from_idx].contains(&result.as_str()) {
                    return Err(KernelError::UndeclaredResult {
                        plugin: from.clone(),
                        result: result.clone(),
                    });
                }
                let jump = if target == END {
                    Jump::End
                } else {
                    match position.get(target.as_str()) {
                        Some(&to_idx) if to_idx > from_idx => Jump::To(to_idx),
                        _ => {
                            return Err(KernelError::InvalidJump {
                                from: from.clone(),
                                to: target.clone(),
                            });
                        }
                    }
                };
                jumps[from_idx].insert(result.clone(), jump);
            }
        }

        Ok(Self {
            name: config.name,
            plugins: config.plugins,
            jumps,
        })
    }
}

#[async_trait]
impl Pipeline for LinearPipeline {
    fn kind(&self) -> &str {
        KIND
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn plugin_names(&self) -> &[String] {
        &self.plugins
    }

    async fn run(&self, catalog: &dyn PluginCatalog, ctx: &mut StageContext) -> PipelineOutcome {
        let mut executed = Vec::new();
        let mut last_result = StageResult::Continue;
        let mut idx = 0;

        while idx < self.plugins.len() {
            let plugin = &self.plugins[idx];
            let Some(stage) = catalog.plugin(plugin) else {
                warn!(pipeline = %self.name, plugin = %plugin, "plugin not registered; aborting run");
                ctx.response.set_status(503);
                ctx.add_tag(format!("pipeline: plugin {plugin} unavailable"));
                last_result = StageResult::named(RESULT_PLUGIN_UNAVAILABLE);
                break;
            };

            let result = stage.handle(ctx).await;
            executed.push(plugin.clone());

            let next = match result.label() {
                None => Some(idx + 1),
                Some(label) => match self.jumps[idx].get(label) {
                    Some(Jump::To(target)) => Some(*target),
                    Some(Jump::End) | None => None,
                },
            };
            last_result = result;
            match next {
                Some(next_idx) => idx = next_idx,
                None => break,
            }
        }

        PipelineOutcome {
            executed,
            last_result,
        }
    }

    fn reconfigure(
        &self,
        spec: &PipelineSpec,
        catalog: &dyn PluginCatalog,
    ) -> KernelResult<Arc<dyn Pipeline>> {
        Ok(Arc::new(LinearPipeline::new(spec, catalog)?))
    }
}

#[derive(Debug, Default)]
pub struct LinearPipelineFactory;

impl PipelineFactory for LinearPipelineFactory {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn create(
        &self,
        spec: &PipelineSpec,
        catalog: &dyn PluginCatalog,
    ) -> KernelResult<Arc<dyn Pipeline>> {
        Ok(Arc::new(LinearPipeline::new(spec, catalog)?))
    }
}

//! Pipeline contract.
//!
//! A pipeline is an ordered list of plugin references. It does not own its
//! stages: each step resolves the plugin by name through a
//! [`PluginCatalog`], so a hot-reloaded stage is picked up at the next stage
//! boundary without rebuilding the pipeline.

use crate::error::KernelResult;
use crate::spec::PipelineSpec;
use crate::stage::{Stage, StageResult};
use crate::types::StageContext;
use async_trait::async_trait;
use std::sync::Arc;

/// Name → live stage lookup, implemented by the control-plane registry.
pub trait PluginCatalog: Send + Sync {
    /// Currently registered instance for `name`.
    fn plugin(&self, name: &str) -> Option<Arc<dyn Stage>>;

    /// Named results declared by the type of plugin `name`; `None` if the
    /// plugin is not registered.
    fn plugin_results(&self, name: &str) -> Option<&'static [&'static str]>;
}

/// What happened to one request inside a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Plugins that handled the request, in execution order.
    pub executed: Vec<String>,
    /// Result of the last executed stage.
    pub last_result: StageResult,
}

/// A live pipeline instance bound to one [`PipelineSpec`].
#[async_trait]
pub trait Pipeline: Send + Sync {
    fn kind(&self) -> &str;

    fn name(&self) -> &str;

    /// Plugins this pipeline references, used for referential integrity.
    fn plugin_names(&self) -> &[String];

    /// Run one request through the stages.
    async fn run(&self, catalog: &dyn PluginCatalog, ctx: &mut StageContext) -> PipelineOutcome;

    /// Build the successor for a new spec of the same name and type.
    fn reconfigure(
        &self,
        spec: &PipelineSpec,
        catalog: &dyn PluginCatalog,
    ) -> KernelResult<Arc<dyn Pipeline>>;

    fn dispose(&self) -> KernelResult<()> {
        Ok(())
    }
}

/// Constructor for one pipeline type.
pub trait PipelineFactory: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Validate `spec` against the plugins currently in `catalog` and build
    /// a fresh pipeline.
    fn create(
        &self,
        spec: &PipelineSpec,
        catalog: &dyn PluginCatalog,
    ) -> KernelResult<Arc<dyn Pipeline>>;
}

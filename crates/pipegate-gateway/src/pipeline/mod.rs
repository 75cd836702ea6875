//! Built-in pipeline types.

pub mod linear;

pub use linear::{LinearPipeline, LinearPipelineConfig, LinearPipelineFactory};

use pipegate_kernel::PipelineFactory;
use std::sync::Arc;

/// Factories for every pipeline type shipped with the gateway.
pub fn builtin_pipeline_factories() -> Vec<Arc<dyn PipelineFactory>> {
    vec![Arc::new(LinearPipelineFactory)]
}

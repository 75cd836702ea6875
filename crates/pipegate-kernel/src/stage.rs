//! Stage contract and the hot-reload protocol.
//!
//! A stage is one unit of per-request processing inside a pipeline. Every
//! stage type honours the same lifecycle:
//!
//! ```text
//!   StageFactory::create(spec)      first instantiation of a name
//!         │                         (allocates warm state, starts tasks)
//!         ▼
//!   Stage::reconfigure(spec) ──┐    hot reload: successor shares the
//!         ▲                    │    predecessor's warm state, only cold
//!         └────────────────────┘    parameters change
//!         │
//!         ▼
//!   Stage::dispose()                final removal of the name, once
//! ```

use crate::error::KernelResult;
use crate::spec::PluginSpec;
use crate::types::StageContext;
use async_trait::async_trait;
use std::sync::Arc;

/// Outcome of a single stage invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult {
    /// Hand the request to the next stage.
    Continue,
    /// Short-circuit with a named result; the pipeline decides where to go.
    Named(String),
}

impl StageResult {
    pub fn named(label: impl Into<String>) -> Self {
        StageResult::Named(label.into())
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, StageResult::Continue)
    }

    /// The result label, `None` for [`StageResult::Continue`].
    pub fn label(&self) -> Option<&str> {
        match self {
            StageResult::Continue => None,
            StageResult::Named(label) => Some(label),
        }
    }
}

/// A live, shareable stage instance bound to one [`PluginSpec`].
///
/// Instances are shared behind `Arc` by every request hitting the stage, so
/// `handle` takes `&self`; any per-name mutable state lives behind interior
/// synchronisation inside the implementation.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Plugin type identifier, e.g. `RateLimiter`.
    fn kind(&self) -> &str;

    /// Registered plugin name.
    fn name(&self) -> &str;

    /// Process one request.
    ///
    /// Only stages doing admission control may suspend here, and they must
    /// return promptly once [`StageContext::cancellation`] fires.
    async fn handle(&self, ctx: &mut StageContext) -> StageResult;

    /// Runtime status document, if the stage exposes one.
    fn status(&self) -> Option<serde_json::Value> {
        None
    }

    /// Build the successor instance for a new spec of the same name and type.
    ///
    /// The successor reuses this instance's warm state (limiters,
    /// accumulators, background task handles) and applies only the new
    /// parameters. `spec` is fully validated before any shared state is
    /// touched, so an `Err` leaves this instance exactly as it was.
    fn reconfigure(&self, spec: &PluginSpec) -> KernelResult<Arc<dyn Stage>>;

    /// Retire warm state. Called once when the name is permanently removed;
    /// further calls must be harmless. On `Err` the registry keeps the entry
    /// so the caller can retry.
    fn dispose(&self) -> KernelResult<()> {
        Ok(())
    }
}

/// Constructor for one plugin type.
pub trait StageFactory: Send + Sync {
    /// Plugin type identifier this factory builds.
    fn kind(&self) -> &'static str;

    /// Named results the stage may produce besides `Continue`.
    fn results(&self) -> &'static [&'static str] {
        &[]
    }

    /// First instantiation of a name: validate `spec` and allocate fresh
    /// warm state.
    fn create(&self, spec: &PluginSpec) -> KernelResult<Arc<dyn Stage>>;
}

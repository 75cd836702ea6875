//! `pipegate-kernel` — contracts for the pipegate gateway.
//!
//! This crate defines the *trait interfaces and data types* shared by the
//! control plane and the data plane. No concrete stages live here; those
//! belong in `pipegate-gateway`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              pipegate-kernel  (this crate)                  │
//! │  Stage / StageFactory      Pipeline / PipelineFactory       │
//! │  PluginSpec / PipelineSpec PluginCatalog                    │
//! │  GatewayRequest/Response/StageContext   KernelError         │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │  depends on
//! ┌──────────────────────────▼──────────────────────────────────┐
//! │              pipegate-gateway  (runtime crate)              │
//! │  RateLimiter / RequestAdaptor stages   PathAdaptor          │
//! │  LinearPipeline            Model (control-plane registry)   │
//! │  GatewayServer (axum admin API + data plane)                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod pipeline;
pub mod spec;
pub mod stage;
pub mod types;

// ── Flat re-exports ────────────────────────────────────────────────────────

pub use error::{KernelError, KernelResult};
pub use pipeline::{Pipeline, PipelineFactory, PipelineOutcome, PluginCatalog};
pub use spec::{PipelineSpec, PluginSpec, parse_duration};
pub use stage::{Stage, StageFactory, StageResult};
pub use types::{GatewayRequest, GatewayResponse, HttpMethod, StageContext};

//! `pipegate-gateway` — pipegate runtime.
//!
//! This crate provides the concrete implementations of the contracts defined
//! in `pipegate-kernel`:
//!
//! | Kernel contract | Implementation |
//! |----------------|----------------|
//! | [`Stage`] | [`plugin::RateLimiter`], [`plugin::RequestAdaptor`] |
//! | [`Pipeline`] | [`pipeline::LinearPipeline`] |
//! | [`PluginCatalog`] | [`model::Model`] |
//!
//! The [`server::GatewayServer`] exposes the registry through an axum admin
//! API and runs requests through pipelines on `/run/{pipeline}/...`.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use pipegate_gateway::server::{GatewayServer, GatewayServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = GatewayServer::new(GatewayServerConfig {
//!         port: 8080,
//!         ..Default::default()
//!     });
//!     server.start().await.unwrap();
//! }
//! ```
//!
//! [`Stage`]: pipegate_kernel::Stage
//! [`Pipeline`]: pipegate_kernel::Pipeline
//! [`PluginCatalog`]: pipegate_kernel::PluginCatalog

pub mod error;
pub mod handlers;
pub mod model;
pub mod path_adaptor;
pub mod pipeline;
pub mod plugin;
pub mod server;
pub mod state;

pub use error::{GatewayError, GatewayResult};
pub use model::{ListFilter, Model};

// Re-export the kernel for convenience.
pub use pipegate_kernel as kernel;

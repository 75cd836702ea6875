//! Axum-based HTTP server.
//!
//! [`GatewayServer`] wires the [`Model`] registry into the admin API and the
//! data-plane runner.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness check. |
//! | `*`    | `/v1/plugins[/{name}[/status]]` | Plugin management. |
//! | `*`    | `/v1/pipelines[/{name}]` | Pipeline management. |
//! | `GET`  | `/v1/plugin-types`, `/v1/pipeline-types` | Registered types. |
//! | `ANY`  | `/run/{pipeline}/{*path}` | Run a request through a pipeline. |

use crate::error::{GatewayError, GatewayResult};
use crate::handlers::{health_router, pipelines_router, plugins_router, run_router};
use crate::model::Model;
use crate::state::AppState;
use axum::Router;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

// ─────────────────────────────────────────────────────────────────────────────
// GatewayServerConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime configuration for [`GatewayServer`].
#[derive(Debug, Clone)]
pub struct GatewayServerConfig {
    /// TCP port to listen on (default: 8080).
    pub port: u16,
    /// Optional YAML file of plugins and pipelines created at start.
    pub bootstrap: Option<PathBuf>,
}

impl Default for GatewayServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bootstrap: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bootstrap file
// ─────────────────────────────────────────────────────────────────────────────

/// One `{type, config}` entry of the bootstrap file.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: Value,
}

/// Plugins and pipelines to create before serving. Read once; the registry
/// never writes back to it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Bootstrap {
    #[serde(default)]
    pub plugins: Vec<BootstrapEntry>,
    #[serde(default)]
    pub pipelines: Vec<BootstrapEntry>,
}

impl Bootstrap {
    pub fn from_yaml(text: &str) -> GatewayResult<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| GatewayError::Internal(format!("invalid bootstrap file: {e}")))
    }

    pub fn load(path: &Path) -> GatewayResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Internal(format!("cannot read bootstrap file {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    /// Create every plugin, then every pipeline. Stops at the first failure.
    pub fn apply(&self, model: &Model) -> GatewayResult<()> {
        for entry in &self.plugins {
            model.add_plugin(&entry.kind, entry.config.clone())?;
        }
        for entry in &self.pipelines {
            model.add_pipeline(&entry.kind, entry.config.clone())?;
        }
        info!(
            plugins = self.plugins.len(),
            pipelines = self.pipelines.len(),
            "bootstrap applied"
        );
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GatewayServer
// ─────────────────────────────────────────────────────────────────────────────

pub struct GatewayServer {
    config: GatewayServerConfig,
    model: Arc<Model>,
}

impl GatewayServer {
    /// Server over a registry with every built-in plugin and pipeline type.
    pub fn new(config: GatewayServerConfig) -> Self {
        Self::with_model(config, Arc::new(Model::with_builtins()))
    }

    pub fn with_model(config: GatewayServerConfig, model: Arc<Model>) -> Self {
        Self { config, model }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Build the axum [`Router`] over this server's registry.
    pub fn build_app(&self) -> Router {
        let state = Arc::new(AppState::new(self.model.clone()));
        Router::new()
            .merge(health_router())
            .merge(plugins_router())
            .merge(pipelines_router())
            .merge(run_router())
            .with_state(state)
    }

    /// Apply the bootstrap file (if any), bind `0.0.0.0:{port}` and serve
    /// until the process exits.
    ///
    /// Must be called inside a tokio runtime: stages start their background
    /// tasks on creation.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(path) = &self.config.bootstrap {
            Bootstrap::load(path)?.apply(&self.model)?;
        }

        let app = self.build_app();
        let addr = format!("0.0.0.0:{}", self.config.port);
        info!(addr = %addr, "pipegate starting");
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}

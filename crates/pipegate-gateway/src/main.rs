//! pipegate — entry point.
//!
//! Reads configuration from environment variables and starts the admin API
//! and data plane.
//!
//! # Environment variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PIPEGATE_PORT` | `8080` | TCP port to listen on. |
//! | `PIPEGATE_BOOTSTRAP` | *(none)* | YAML file of plugins and pipelines created at start. |

use pipegate_gateway::server::{GatewayServer, GatewayServerConfig};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pipegate_gateway=info")),
        )
        .init();

    let port: u16 = std::env::var("PIPEGATE_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);

    let bootstrap = std::env::var("PIPEGATE_BOOTSTRAP")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);

    info!(port, bootstrap = ?bootstrap, "pipegate configuration loaded");

    let server = GatewayServer::new(GatewayServerConfig { port, bootstrap });
    if let Err(e) = server.start().await {
        error!(error = %e, "pipegate stopped");
        std::process::exit(1);
    }
}

//! Plugin management endpoints
//!
//! POST   /v1/plugins                - create a plugin
//! PUT    /v1/plugins                - hot-reload a plugin with a new config
//! GET    /v1/plugins                - list plugins (`name_pattern`, `types`)
//! GET    /v1/plugins/{name}         - stored spec
//! GET    /v1/plugins/{name}/status  - runtime status document
//! DELETE /v1/plugins/{name}         - dismiss and delete
//! GET    /v1/plugin-types           - registered plugin types

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use std::sync::Arc;

use super::{ListQuery, SpecPayload};
use crate::error::GatewayError;
use crate::state::AppState;

/// POST /v1/plugins
pub async fn create_plugin(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SpecPayload>,
) -> Result<impl IntoResponse, GatewayError> {
    state.model.add_plugin(&payload.kind, payload.config)?;
    Ok((StatusCode::OK, Json(json!({ "status": "created" }))))
}

/// PUT /v1/plugins
pub async fn update_plugin(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SpecPayload>,
) -> Result<impl IntoResponse, GatewayError> {
    state.model.update_plugin(&payload.kind, payload.config)?;
    Ok(Json(json!({ "status": "updated" })))
}

/// GET /v1/plugins
pub async fn list_plugins(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let filter = query.to_filter()?;
    let plugins = state.model.list_plugins(&filter);
    Ok(Json(json!({
        "total": plugins.len(),
        "plugins": plugins,
    })))
}

/// GET /v1/plugins/{name}
pub async fn get_plugin(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.model.plugin_spec(&name)?))
}

/// GET /v1/plugins/{name}/status
pub async fn plugin_status(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.model.plugin_status(&name)?))
}

/// DELETE /v1/plugins/{name}
///
/// Rejected while any pipeline references the plugin. A failed teardown
/// leaves the plugin registered; repeat the call to retry.
pub async fn delete_plugin(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    state.model.retire_plugin(&name)?;
    Ok(Json(json!({ "name": name, "status": "deleted" })))
}

/// GET /v1/plugin-types
pub async fn plugin_types(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.model.plugin_types())
}

pub fn plugins_router() -> axum::Router<Arc<AppState>> {
    use axum::routing::get;
    axum::Router::new()
        .route(
            "/v1/plugins",
            get(list_plugins).post(create_plugin).put(update_plugin),
        )
        .route("/v1/plugins/{name}", get(get_plugin).delete(delete_plugin))
        .route("/v1/plugins/{name}/status", get(plugin_status))
        .route("/v1/plugin-types", get(plugin_types))
}

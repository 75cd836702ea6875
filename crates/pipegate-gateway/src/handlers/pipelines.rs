//! Pipeline management endpoints
//!
//! POST   /v1/pipelines          - create a pipeline
//! PUT    /v1/pipelines          - replace a pipeline's config
//! GET    /v1/pipelines          - list pipelines (`name_pattern`, `types`)
//! GET    /v1/pipelines/{name}   - stored spec
//! DELETE /v1/pipelines/{name}   - dismiss and delete
//! GET    /v1/pipeline-types     - registered pipeline types

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

/// POST /v1/pipelines
pub async fn create_pipeline(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SpecPayload>,
) -> Result<impl IntoResponse, GatewayError> {
    state.model.add_pipeline(&payload.kind, payload.config)?;
    Ok((StatusCode::OK, Json(json!({ "status": "created" }))))
}

/// PUT /v1/pipelines
pub async fn update_pipeline(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SpecPayload>,
) -> Result<impl IntoResponse, GatewayError> {
    state.model.update_pipeline(&payload.kind, payload.config)?;
    Ok(Json(json!({ "status": "updated" })))
}

/// GET /v1/pipelines
pub async fn list_pipelines(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let filter = query.to_filter()?;
    let pipelines = state.model.list_pipelines(&filter);
    Ok(Json(json!({
        "total": pipelines.len(),
        "pipelines": pipelines,
    })))
}

/// GET /v1/pipelines/{name}
pub async fn get_pipeline(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.model.pipeline_spec(&name)?))
}

/// DELETE /v1/pipelines/{name}
pub async fn delete_pipeline(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    state.model.retire_pipeline(&name)?;
    Ok(Json(json!({ "name": name, "status": "deleted" })))
}

/// GET /v1/pipeline-types
pub async fn pipeline_types(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.model.pipeline_types())
}

pub fn pipelines_router() -> axum::Router<Arc<AppState>> {
    use axum::routing::get;
    axum::Router::new()
        .route(
            "/v1/pipelines",
            get(list_pipelines).post(create_pipeline).put(update_pipeline),
        )
        .route(
            "/v1/pipelines/{name}",
            get(get_pipeline).delete(delete_pipeline),
        )
        .route("/v1/pipeline-types", get(pipeline_types))
}

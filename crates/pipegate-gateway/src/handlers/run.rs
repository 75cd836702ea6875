//! Data-plane endpoint
//!
//! ANY /run/{pipeline}/{*path} - run one request through a pipeline
//!
//! There is no upstream: the reply carries the status the stages produced
//! (200 unless one of them set another), the headers they set, and either the
//! body a stage produced (fallback mock) or a JSON summary of the adapted
//! request.

use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use pipegate_kernel::{GatewayRequest, HttpMethod, KernelError, StageContext};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::GatewayError;
use crate::state::AppState;

/// ANY /run/{pipeline} and /run/{pipeline}/{*path}
pub async fn run_pipeline(
    State(state): State<Arc<AppState>>,
    Path(params): Path<HashMap<String, String>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let pipeline = params.get("pipeline").cloned().unwrap_or_default();
    let path = format!("/{}", params.get("path").map(String::as_str).unwrap_or_default());

    let method = HttpMethod::from_str_ci(method.as_str()).ok_or_else(|| {
        GatewayError::InvalidConfig(KernelError::invalid_field(
            "method",
            format!("'{method}' is not supported"),
        ))
    })?;

    let request_id = Uuid::new_v4().to_string();
    let mut request = GatewayRequest::new(&request_id, method, path).with_body(body.to_vec());
    for (name, value) in &headers {
        if let Ok(v) = value.to_str() {
            request.add_header(name.as_str(), v);
        }
    }

    // Client disconnects drop this future, which cancels any pending wait.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let mut ctx = StageContext::with_cancellation(request, cancel);

    let outcome = state.model.run_pipeline(&pipeline, &mut ctx).await?;
    debug!(
        request_id = %request_id,
        pipeline = %pipeline,
        executed = ?outcome.executed,
        status = ctx.response.status,
        "pipeline finished"
    );

    let status = StatusCode::from_u16(ctx.response.status).unwrap_or_else(|_| {
        warn!(status = ctx.response.status, "stage produced an invalid status code");
        StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut response = if ctx.response.body.is_empty() {
        let summary = json!({
            "pipeline": pipeline,
            "executed": outcome.executed,
            "result": outcome.last_result.label(),
            "request": {
                "id": ctx.request.id,
                "method": ctx.request.method,
                "path": ctx.request.path,
                "headers": ctx.request.headers,
            },
            "tags": ctx.tags(),
        });
        (status, Json(summary)).into_response()
    } else {
        (status, Body::from(std::mem::take(&mut ctx.response.body))).into_response()
    };

    for (name, value) in &ctx.response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!(header = %name, "dropping invalid response header"),
        }
    }

    Ok(response)
}

pub fn run_router() -> axum::Router<Arc<AppState>> {
    use axum::routing::any;
    axum::Router::new()
        .route("/run/{pipeline}", any(run_pipeline))
        .route("/run/{pipeline}/{*path}", any(run_pipeline))
}

//! Gateway error types

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pipegate_kernel::KernelError;
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Which registry namespace an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Plugin,
    Pipeline,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Plugin => f.write_str("plugin"),
            Namespace::Pipeline => f.write_str("pipeline"),
        }
    }
}

/// Control-plane errors. Each one is local to the failed operation: the
/// registry is left exactly as it was before the call.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid config: {0}")]
    InvalidConfig(KernelError),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("{0} '{1}' not found")]
    NotFound(Namespace, String),

    #[error("{0} '{1}' already exists")]
    AlreadyExists(Namespace, String),

    #[error("{namespace} '{name}' has type '{stored}'; type is read-only (got '{requested}')")]
    ImmutableType {
        namespace: Namespace,
        name: String,
        stored: String,
        requested: String,
    },

    #[error("{0} '{1}' has been dismissed")]
    Dismissed(Namespace, String),

    #[error("{0} '{1}' must be dismissed before it is deleted")]
    NotDismissed(Namespace, String),

    #[error("plugin '{name}' is referenced by pipelines {pipelines:?}")]
    Referenced { name: String, pipelines: Vec<String> },

    #[error("dismiss failed: {0}")]
    DismissFailed(KernelError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<KernelError> for GatewayError {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::NoRuntime(_) => GatewayError::Internal(err.to_string()),
            KernelError::DisposeFailed { .. } => GatewayError::DismissFailed(err),
            other => GatewayError::InvalidConfig(other),
        }
    }
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidConfig(_)
            | GatewayError::InvalidFilter(_)
            | GatewayError::ImmutableType { .. }
            | GatewayError::Dismissed(..) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(..) => StatusCode::NOT_FOUND,
            GatewayError::AlreadyExists(..) => StatusCode::CONFLICT,
            GatewayError::NotDismissed(..) | GatewayError::Referenced { .. } => {
                StatusCode::NOT_ACCEPTABLE
            }
            GatewayError::DismissFailed(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidConfig(_) => "INVALID_CONFIG",
            GatewayError::InvalidFilter(_) => "INVALID_FILTER",
            GatewayError::NotFound(..) => "NOT_FOUND",
            GatewayError::AlreadyExists(..) => "ALREADY_EXISTS",
            GatewayError::ImmutableType { .. } => "TYPE_READONLY",
            GatewayError::Dismissed(..) => "DISMISSED",
            GatewayError::NotDismissed(..) => "NOT_DISMISSED",
            GatewayError::Referenced { .. } => "REFERENCED",
            GatewayError::DismissFailed(_) => "DISMISS_FAILED",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }));

        (self.status_code(), body).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

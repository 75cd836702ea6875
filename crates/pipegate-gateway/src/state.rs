//! Shared application state for the admin and data-plane server

use crate::model::Model;
use std::sync::Arc;

/// State shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Plugin and pipeline registry - source of truth for every live stage
    pub model: Arc<Model>,
}

impl AppState {
    pub fn new(model: Arc<Model>) -> Self {
        Self { model }
    }
}

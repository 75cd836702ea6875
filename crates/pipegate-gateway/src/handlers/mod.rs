//! Request handlers for the admin API and the data plane

pub mod health;
pub mod pipelines;
pub mod plugins;
pub mod run;

pub use health::health_router;
pub use pipelines::pipelines_router;
pub use plugins::plugins_router;
pub use run::run_router;

use serde::Deserialize;
use serde_json::Value;

use crate::error::GatewayResult;
use crate::model::ListFilter;

// ─────────────────────────────────────────────────────────────────────────────
// Shared DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for create and update: `{"type": ..., "config": {...}}`.
/// The name is read from `config.name`.
#[derive(Debug, Deserialize)]
pub struct SpecPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: Value,
}

/// Query string of the list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Regular expression matched against names
    pub name_pattern: Option<String>,
    /// Comma-separated type names
    pub types: Option<String>,
}

impl ListQuery {
    pub fn to_filter(&self) -> GatewayResult<ListFilter> {
        let types = self
            .types
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        ListFilter::new(self.name_pattern.as_deref(), types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_are_split_and_trimmed() {
        let query = ListQuery {
            name_pattern: None,
            types: Some("RateLimiter, ,RequestAdaptor".into()),
        };
        assert!(query.to_filter().is_ok());

        let bad = ListQuery {
            name_pattern: Some("[".into()),
            types: None,
        };
        assert!(bad.to_filter().is_err());
    }
}

//! Mock response written when a stage gives up on a request.

use pipegate_kernel::GatewayResponse;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackSpec {
    #[serde(default)]
    pub mock_headers: HashMap<String, String>,
    #[serde(default)]
    pub mock_body: String,
}

#[derive(Debug, Clone)]
pub struct Fallback {
    spec: FallbackSpec,
}

impl Fallback {
    pub fn new(spec: FallbackSpec) -> Self {
        Self { spec }
    }

    /// Overwrite the response body and set the mock headers. Status is left
    /// to the caller.
    pub fn apply(&self, resp: &mut GatewayResponse) {
        for (name, value) in &self.spec.mock_headers {
            resp.set_header(name.as_str(), value.as_str());
        }
        resp.body = self.spec.mock_body.clone().into_bytes();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_headers_and_body() {
        let fallback = Fallback::new(FallbackSpec {
            mock_headers: HashMap::from([("Retry-After".to_string(), "1".to_string())]),
            mock_body: "slow down".into(),
        });
        let mut resp = GatewayResponse::default();
        fallback.apply(&mut resp);
        assert_eq!(resp.headers.get("retry-after").map(String::as_str), Some("1"));
        assert_eq!(resp.body, b"slow down");
        assert_eq!(resp.status, 200);
    }
}

//! Header adaptation rules.

use pipegate_kernel::GatewayRequest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rules applied in the order `del`, `set`, `add`. Names are
/// case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderAdaptSpec {
    #[serde(default)]
    pub del: Vec<String>,
    #[serde(default)]
    pub set: BTreeMap<String, String>,
    /// Appended to any existing value.
    #[serde(default)]
    pub add: BTreeMap<String, String>,
}

impl HeaderAdaptSpec {
    pub fn is_empty(&self) -> bool {
        self.del.is_empty() && self.set.is_empty() && self.add.is_empty()
    }

    pub fn apply(&self, req: &mut GatewayRequest) {
        for name in &self.del {
            req.remove_header(name);
        }
        for (name, value) in &self.set {
            req.set_header(name.as_str(), value.as_str());
        }
        for (name, value) in &self.add {
            req.add_header(name.as_str(), value.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipegate_kernel::HttpMethod;

    #[test]
    fn del_then_set_then_add() {
        let spec = HeaderAdaptSpec {
            del: vec!["X-Internal".into(), "Cookie".into()],
            set: BTreeMap::from([("X-Gateway".into(), "pipegate".into())]),
            add: BTreeMap::from([
                ("Accept".into(), "application/json".into()),
                ("X-Gateway".into(), "edge".into()),
            ]),
        };
        let mut req = GatewayRequest::new("r1", HttpMethod::Get, "/")
            .with_header("x-internal", "secret")
            .with_header("accept", "text/html");

        spec.apply(&mut req);

        assert!(req.header("x-internal").is_none());
        assert_eq!(req.header("accept"), Some("text/html, application/json"));
        assert_eq!(req.header("x-gateway"), Some("pipegate, edge"));
    }
}

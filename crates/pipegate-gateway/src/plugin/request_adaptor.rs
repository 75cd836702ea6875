//! `RequestAdaptor` stage: rewrites method, path and headers.
//!
//! Never short-circuits. Holds no warm state, so reconfiguration simply
//! builds a fresh instance from the new spec.

use super::header::HeaderAdaptSpec;
use crate::path_adaptor::{PathAdaptor, PathAdaptorSpec};
use async_trait::async_trait;
use pipegate_kernel::{
    HttpMethod, KernelError, KernelResult, PluginSpec, Stage, StageContext, StageFactory,
    StageResult,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const KIND: &str = "RequestAdaptor";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestAdaptorConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathAdaptorSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderAdaptSpec>,
}

#[derive(Debug)]
pub struct RequestAdaptor {
    name: String,
    method: Option<HttpMethod>,
    path: Option<PathAdaptor>,
    header: Option<HeaderAdaptSpec>,
}

impl RequestAdaptor {
    pub fn new(spec: &PluginSpec) -> KernelResult<Self> {
        let config: RequestAdaptorConfig = spec.decode()?;

        let method = match config.method.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(HttpMethod::from_str_ci(raw).ok_or_else(|| {
                KernelError::invalid_field("method", format!("'{raw}' is not an HTTP method"))
            })?),
        };
        let path = config.path.as_ref().map(PathAdaptor::new).transpose()?;

        Ok(Self {
            name: config.name,
            method,
            path,
            header: config.header.filter(|h| !h.is_empty()),
        })
    }
}

#[async_trait]
impl Stage for RequestAdaptor {
    fn kind(&self) -> &str {
        KIND
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: &mut StageContext) -> StageResult {
        if let Some(method) = self.method {
            let current = ctx.request.method;
            if current != method {
                ctx.add_tag(format!("requestAdaptor: method {current} adapted to {method}"));
                ctx.request.method = method;
            }
        }

        if let Some(path_adaptor) = &self.path {
            let adapted = path_adaptor.adapt(&ctx.request.path);
            if adapted != ctx.request.path {
                let tag = format!(
                    "requestAdaptor: path {} adapted to {}",
                    ctx.request.path, adapted
                );
                ctx.add_tag(tag);
            }
            ctx.request.path = adapted;
        }

        if let Some(header) = &self.header {
            header.apply(&mut ctx.request);
        }

        StageResult::Continue
    }

    fn reconfigure(&self, spec: &PluginSpec) -> KernelResult<Arc<dyn Stage>> {
        Ok(Arc::new(RequestAdaptor::new(spec)?))
    }
}

#[derive(Debug, Default)]
pub struct RequestAdaptorFactory;

impl StageFactory for RequestAdaptorFactory {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn create(&self, spec: &PluginSpec) -> KernelResult<Arc<dyn Stage>> {
        Ok(Arc::new(RequestAdaptor::new(spec)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipegate_kernel::GatewayRequest;
    use serde_json::json;

    fn adaptor(config: serde_json::Value) -> RequestAdaptor {
        RequestAdaptor::new(&PluginSpec::from_payload(KIND, config).unwrap()).unwrap()
    }

    fn ctx(method: HttpMethod, path: &str) -> StageContext {
        StageContext::new(GatewayRequest::new("req", method, path))
    }

    #[tokio::test]
    async fn method_change_is_tagged_once() {
        let ra = adaptor(json!({"name": "ra", "method": "POST"}));
        let mut ctx = ctx(HttpMethod::Get, "/users");

        assert_eq!(ra.handle(&mut ctx).await, StageResult::Continue);
        assert_eq!(ctx.request.method, HttpMethod::Post);
        assert_eq!(ctx.tags().len(), 1);

        assert_eq!(ra.handle(&mut ctx).await, StageResult::Continue);
        assert_eq!(ctx.request.method, HttpMethod::Post);
        assert_eq!(ctx.tags().len(), 1);
    }

    #[tokio::test]
    async fn path_is_written_back_and_tagged_only_on_change() {
        let ra = adaptor(json!({"name": "ra", "path": {"trim_prefix": "/api/v1"}}));

        let mut changed = ctx(HttpMethod::Get, "/api/v1/users");
        ra.handle(&mut changed).await;
        assert_eq!(changed.request.path, "/users");
        assert_eq!(
            changed.tags(),
            ["requestAdaptor: path /api/v1/users adapted to /users".to_string()]
        );

        let mut untouched = ctx(HttpMethod::Get, "/health");
        ra.handle(&mut untouched).await;
        assert_eq!(untouched.request.path, "/health");
        assert!(untouched.tags().is_empty());
    }

    #[tokio::test]
    async fn headers_adapted_unconditionally() {
        let ra = adaptor(json!({
            "name": "ra",
            "header": {"del": ["x-debug"], "set": {"x-env": "prod"}}
        }));
        let mut ctx = StageContext::new(
            GatewayRequest::new("req", HttpMethod::Get, "/").with_header("X-Debug", "1"),
        );
        ra.handle(&mut ctx).await;
        assert!(ctx.request.header("x-debug").is_none());
        assert_eq!(ctx.request.header("x-env"), Some("prod"));
        assert!(ctx.tags().is_empty());
    }

    #[test]
    fn invalid_method_rejected() {
        let spec = PluginSpec::from_payload(KIND, json!({"name": "ra", "method": "FETCH"})).unwrap();
        assert!(matches!(
            RequestAdaptor::new(&spec),
            Err(KernelError::InvalidField { ref field, .. }) if field == "method"
        ));
    }

    #[test]
    fn invalid_path_regexp_rejected() {
        let spec = PluginSpec::from_payload(
            KIND,
            json!({"name": "ra", "path": {"regexp_replace": {"regexp": "[", "replace": ""}}}),
        )
        .unwrap();
        assert!(RequestAdaptor::new(&spec).is_err());
    }
}

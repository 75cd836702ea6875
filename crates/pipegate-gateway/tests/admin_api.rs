use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use pipegate_gateway::server::{GatewayServer, GatewayServerConfig};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    GatewayServer::new(GatewayServerConfig::default()).build_app()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, _, bytes) = send_raw(app, method, uri, body, &[]).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn send_raw(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.expect("request success");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, headers, bytes.to_vec())
}

#[tokio::test]
async fn health_is_ok() {
    let (status, body) = send(&app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn type_catalogs_are_sorted() {
    let app = app();
    let (status, body) = send(&app, "GET", "/v1/plugin-types", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["RateLimiter", "RequestAdaptor"]));

    let (_, body) = send(&app, "GET", "/v1/pipeline-types", None).await;
    assert_eq!(body, json!(["LinearPipeline"]));
}

#[tokio::test]
async fn plugin_lifecycle_over_http() {
    let app = app();
    let create = json!({"type": "RateLimiter", "config": {"name": "rl", "tps": 5}});

    let (status, _) = send(&app, "POST", "/v1/plugins", Some(create.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "POST", "/v1/plugins", Some(create)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_EXISTS");

    let (status, body) = send(&app, "GET", "/v1/plugins/rl", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "RateLimiter");
    assert_eq!(body["config"]["tps"], 5);

    let (status, body) = send(&app, "GET", "/v1/plugins/rl/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"tps": 0}));

    let retype = json!({"type": "RequestAdaptor", "config": {"name": "rl"}});
    let (status, body) = send(&app, "PUT", "/v1/plugins", Some(retype)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "TYPE_READONLY");

    let invalid = json!({"type": "RateLimiter", "config": {"name": "rl", "tps": 0}});
    let (status, _) = send(&app, "PUT", "/v1/plugins", Some(invalid)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let update = json!({"type": "RateLimiter", "config": {"name": "rl", "tps": 9}});
    let (status, _) = send(&app, "PUT", "/v1/plugins", Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, "GET", "/v1/plugins/rl", None).await;
    assert_eq!(body["config"]["tps"], 9);

    let (status, _) = send(&app, "DELETE", "/v1/plugins/rl", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, "GET", "/v1/plugins/rl", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn missing_name_and_unknown_type_are_bad_requests() {
    let app = app();
    let (status, _) = send(
        &app,
        "POST",
        "/v1/plugins",
        Some(json!({"type": "RateLimiter", "config": {"tps": 1}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/v1/plugins",
        Some(json!({"type": "Teleporter", "config": {"name": "t"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "PUT", "/v1/plugins", Some(json!({"type": "RateLimiter", "config": {"name": "ghost", "tps": 1}}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_filters_by_name_pattern_and_types() {
    let app = app();
    for (kind, name) in [
        ("RateLimiter", "edge-rl"),
        ("RequestAdaptor", "edge-ra"),
        ("RequestAdaptor", "core-ra"),
    ] {
        let mut config = json!({"name": name});
        if kind == "RateLimiter" {
            config["tps"] = json!(1);
        }
        let (status, _) = send(&app, "POST", "/v1/plugins", Some(json!({"type": kind, "config": config}))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = send(&app, "GET", "/v1/plugins", None).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["plugins"][0]["name"], "core-ra");

    let (_, body) = send(&app, "GET", "/v1/plugins?name_pattern=%5Eedge-", None).await;
    assert_eq!(body["total"], 2);

    let (_, body) = send(&app, "GET", "/v1/plugins?types=RequestAdaptor", None).await;
    assert_eq!(body["total"], 2);

    let (_, body) = send(
        &app,
        "GET",
        "/v1/plugins?name_pattern=edge&types=RateLimiter,Other",
        None,
    )
    .await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["plugins"][0]["name"], "edge-rl");

    let (status, body) = send(&app, "GET", "/v1/plugins?name_pattern=%28", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_FILTER");
}

#[tokio::test]
async fn referenced_plugin_delete_is_rejected() {
    let app = app();
    send(
        &app,
        "POST",
        "/v1/plugins",
        Some(json!({"type": "RequestAdaptor", "config": {"name": "ra"}})),
    )
    .await;
    let (status, _) = send(
        &app,
        "POST",
        "/v1/pipelines",
        Some(json!({"type": "LinearPipeline", "config": {"name": "p", "plugins": ["ra"]}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "DELETE", "/v1/plugins/ra", None).await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(body["error"]["code"], "REFERENCED");

    let (status, _) = send(&app, "DELETE", "/v1/pipelines/p", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "DELETE", "/v1/plugins/ra", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn data_plane_adapts_the_request() {
    let app = app();
    let adaptor = json!({
        "type": "RequestAdaptor",
        "config": {
            "name": "strip-api",
            "method": "POST",
            "path": {"trim_prefix": "/api"},
            "header": {"del": ["x-debug"], "set": {"x-env": "test"}}
        }
    });
    send(&app, "POST", "/v1/plugins", Some(adaptor)).await;
    send(
        &app,
        "POST",
        "/v1/pipelines",
        Some(json!({"type": "LinearPipeline", "config": {"name": "edge", "plugins": ["strip-api"]}})),
    )
    .await;

    let (status, _, bytes) = send_raw(&app, "GET", "/run/edge/api/users", None, &[("x-debug", "1")]).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["executed"], json!(["strip-api"]));
    assert_eq!(body["request"]["method"], "POST");
    assert_eq!(body["request"]["path"], "/users");
    assert_eq!(body["request"]["headers"]["x-env"], "test");
    assert!(body["request"]["headers"].get("x-debug").is_none());
    assert_eq!(
        body["tags"],
        json!([
            "requestAdaptor: method GET adapted to POST",
            "requestAdaptor: path /api/users adapted to /users"
        ])
    );

    let (status, body) = send(&app, "GET", "/run/nowhere/x", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn data_plane_rate_limits_with_fallback() {
    let app = app();
    let limiter = json!({
        "type": "RateLimiter",
        "config": {
            "name": "one-per-second",
            "tps": 1,
            "timeout": "1ms",
            "fallback": {"mock_headers": {"retry-after": "1"}, "mock_body": "slow down"}
        }
    });
    send(&app, "POST", "/v1/plugins", Some(limiter)).await;
    send(
        &app,
        "POST",
        "/v1/plugins",
        Some(json!({"type": "RequestAdaptor", "config": {"name": "ra"}})),
    )
    .await;
    send(
        &app,
        "POST",
        "/v1/pipelines",
        Some(json!({"type": "LinearPipeline", "config": {"name": "limited", "plugins": ["one-per-second", "ra"]}})),
    )
    .await;

    let (status, _, bytes) = send_raw(&app, "GET", "/run/limited/a", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["executed"], json!(["one-per-second", "ra"]));

    let (status, headers, bytes) = send_raw(&app, "GET", "/run/limited/a", None, &[]).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(bytes, b"slow down");
    assert_eq!(headers.get("retry-after").unwrap(), "1");
}

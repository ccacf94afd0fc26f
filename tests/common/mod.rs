#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use lark_mcp_bridge::{
    api::{build_router, handlers::ApiState},
    config::{AppConfig, HttpConfig, LarkConfig, ProxyConfig, SecurityConfig},
};
use serde_json::Value;
use tower::ServiceExt;

pub const ADMIN_KEY: &str = "admin-test-key";
pub const USER_KEY: &str = "user-test-key";

/// No keys, no vendor credentials, proxy off
pub fn create_open_config() -> AppConfig {
    AppConfig {
        http: HttpConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
        },
        ..Default::default()
    }
}

/// Admin and user keys configured, so the stricter quota applies
pub fn create_secured_config() -> AppConfig {
    AppConfig {
        security: SecurityConfig {
            admin_key: Some(ADMIN_KEY.to_string()),
            user_key: Some(USER_KEY.to_string()),
            cors_origins: vec!["https://app.example".to_string()],
            ..Default::default()
        },
        ..create_open_config()
    }
}

/// Lark pointed at a mock server with a preset tenant token
pub fn with_mock_lark(mut config: AppConfig, base_url: String) -> AppConfig {
    config.lark = LarkConfig {
        base_url,
        tenant_access_token: Some("t-test".to_string()),
        ..Default::default()
    };
    config
}

pub fn with_proxy(mut config: AppConfig, target_url: String) -> AppConfig {
    config.proxy = ProxyConfig {
        enabled: true,
        target_url: Some(target_url),
        timeout_secs: 2,
    };
    config
}

pub fn build_test_app(config: &AppConfig) -> Router {
    let state = ApiState::from_config(config).expect("state should build");
    build_router(state, &config.security.cors_origins)
}

pub fn rpc_call(id: u64, method: &str, params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

pub fn tool_call(id: u64, name: &str, arguments: Value) -> Value {
    rpc_call(id, "tools/call", serde_json::json!({ "name": name, "arguments": arguments }))
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    body: &Value,
    api_key: Option<&str>,
) -> Response<Body> {
    post_raw(app, uri, body.to_string(), api_key).await
}

pub async fn post_raw(
    app: &Router,
    uri: &str,
    body: impl Into<Body>,
    api_key: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("authorization", format!("Bearer {}", key));
    }

    app.clone()
        .oneshot(builder.body(body.into()).unwrap())
        .await
        .unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn response_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

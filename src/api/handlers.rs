use crate::config::AppConfig;
use crate::error::{BridgeError, Result};
use crate::mcp::{Inbound, IntegrationStatus, McpBridge, RpcMethod};
use crate::proxy::ProxyForwarder;
use crate::security::SecurityGate;
use crate::tools::builtin_catalog;
use crate::vendor::{LarkClient, TelegramClient};
use axum::{
    Json,
    body::{Bytes, to_bytes},
    extract::{ConnectInfo, Request, State},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

/// Largest request body the bridge will read
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    pub bridge: Arc<McpBridge>,
}

impl ApiState {
    /// Wire the vendor clients, tool catalog, security gate and forwarder
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let lark = Arc::new(LarkClient::new(&config.lark, http.clone()));
        let telegram = Arc::new(TelegramClient::new(&config.telegram, http.clone()));
        let integrations = IntegrationStatus {
            lark: lark.is_configured(),
            telegram: telegram.is_configured(),
        };

        let catalog = Arc::new(builtin_catalog(lark, telegram)?);
        let gate = Arc::new(SecurityGate::from_config(config));
        let forwarder = ProxyForwarder::from_config(&config.proxy, http);

        Ok(Self {
            bridge: Arc::new(McpBridge::new(catalog, gate, forwarder, integrations)),
        })
    }

    pub fn gate(&self) -> &Arc<SecurityGate> {
        self.bridge.gate()
    }
}

fn peer_addr(parts: &Parts) -> Option<SocketAddr> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

async fn read_body(req: Request) -> Result<(Parts, Bytes)> {
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES).await.map_err(|_| {
        BridgeError::InvalidContent(format!(
            "Request body unreadable or larger than {} bytes",
            MAX_BODY_BYTES
        ))
    })?;
    Ok((parts, bytes))
}

pub(crate) async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "security_enabled": state.gate().security_enabled(),
        "proxy_enabled": state.bridge.forwarder().is_active(),
    }))
}

pub(crate) async fn server_info(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "methods": RpcMethod::names(),
        "endpoints": {
            "invoke": "/mcp/invoke",
            "proxy": "/mcp/proxy",
            "tools": "/mcp/tools",
            "resources": "/mcp/resources",
            "prompts": "/mcp/prompts",
        },
        "status": state.bridge.status(),
    }))
}

pub(crate) async fn mcp_invoke(State(state): State<ApiState>, req: Request) -> Result<Response> {
    let (parts, body) = read_body(req).await?;
    let reply = state
        .bridge
        .handle_invoke(Inbound {
            headers: &parts.headers,
            peer: peer_addr(&parts),
            body: &body,
        })
        .await?;
    Ok(reply.into_response())
}

pub(crate) async fn mcp_proxy(State(state): State<ApiState>, req: Request) -> Result<Response> {
    let (parts, body) = read_body(req).await?;
    let reply = state
        .bridge
        .handle_proxy(Inbound {
            headers: &parts.headers,
            peer: peer_addr(&parts),
            body: &body,
        })
        .await?;
    Ok(reply.into_response())
}

fn listing(state: &ApiState, parts: &Parts, method: RpcMethod) -> Result<Response> {
    Ok(state
        .bridge
        .handle_listing(&parts.headers, peer_addr(parts), method)?
        .into_response())
}

pub(crate) async fn mcp_list_tools(State(state): State<ApiState>, req: Request) -> Result<Response> {
    let (parts, _) = req.into_parts();
    listing(&state, &parts, RpcMethod::ToolsList)
}

pub(crate) async fn mcp_list_resources(
    State(state): State<ApiState>,
    req: Request,
) -> Result<Response> {
    let (parts, _) = req.into_parts();
    listing(&state, &parts, RpcMethod::ResourcesList)
}

pub(crate) async fn mcp_list_prompts(
    State(state): State<ApiState>,
    req: Request,
) -> Result<Response> {
    let (parts, _) = req.into_parts();
    listing(&state, &parts, RpcMethod::PromptsList)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::Value;

    fn create_test_state() -> ApiState {
        ApiState::from_config(&AppConfig::default()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = health_check(State(create_test_state())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["security_enabled"], false);
    }

    #[tokio::test]
    async fn test_server_info() {
        let response = server_info(State(create_test_state())).await.into_response();
        let json = body_json(response).await;
        assert_eq!(json["name"], env!("CARGO_PKG_NAME"));
        assert_eq!(json["methods"].as_array().unwrap().len(), 5);
        assert_eq!(json["status"]["tool_count"], 16);
    }

    #[tokio::test]
    async fn test_peer_addr_from_connect_info() {
        let mut req = Request::new(axum::body::Body::empty());
        let addr: SocketAddr = "192.0.2.10:4040".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        let (parts, _) = req.into_parts();
        assert_eq!(peer_addr(&parts), Some(addr));
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let req = Request::new(axum::body::Body::from(vec![b'x'; MAX_BODY_BYTES + 1]));
        let err = read_body(req).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidContent(_)));
    }
}

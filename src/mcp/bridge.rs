// JSON-RPC entry point: envelope parsing, the security gate, tool lookup,
// argument validation and dispatch to local handlers or the upstream proxy.

use super::resources::{self, CATALOG_URI, PROMPTS, RESOURCES, STATUS_URI};
use super::types::{RpcError, RpcMethod, RpcRequest, RpcResponse};
use crate::error::Result;
use crate::proxy::{ForwardOutcome, ProxyForwarder};
use crate::security::{Admission, AuthRequirement, RateLimitInfo, SecurityGate};
use crate::tools::handlers::domain_failure;
use crate::tools::{Resolved, ToolCatalog, ToolHandler};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Which vendor integrations have credentials
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IntegrationStatus {
    pub lark: bool,
    pub telegram: bool,
}

/// The parts of an HTTP request the bridge looks at
#[derive(Debug, Clone, Copy)]
pub struct Inbound<'a> {
    pub headers: &'a HeaderMap,
    pub peer: Option<SocketAddr>,
    pub body: &'a [u8],
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Envelope(RpcResponse),
    /// Already-shaped JSON: an upstream envelope or a REST listing
    Raw(Value),
}

/// What goes back to the caller: always HTTP 200, plus quota headers when gated
#[derive(Debug, Clone)]
pub struct BridgeReply {
    pub body: ReplyBody,
    pub quota: Option<RateLimitInfo>,
}

impl BridgeReply {
    fn new(body: ReplyBody, quota: Option<RateLimitInfo>) -> Self {
        Self { body, quota }
    }

    pub fn to_json(&self) -> Value {
        match &self.body {
            ReplyBody::Envelope(response) => json!(response),
            ReplyBody::Raw(value) => value.clone(),
        }
    }
}

impl IntoResponse for BridgeReply {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        if let Some(quota) = &self.quota {
            quota.write_headers(&mut headers);
        }
        (StatusCode::OK, headers, Json(self.to_json())).into_response()
    }
}

pub struct McpBridge {
    catalog: Arc<ToolCatalog>,
    gate: Arc<SecurityGate>,
    forwarder: ProxyForwarder,
    integrations: IntegrationStatus,
}

impl McpBridge {
    pub fn new(
        catalog: Arc<ToolCatalog>,
        gate: Arc<SecurityGate>,
        forwarder: ProxyForwarder,
        integrations: IntegrationStatus,
    ) -> Self {
        Self {
            catalog,
            gate,
            forwarder,
            integrations,
        }
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn gate(&self) -> &Arc<SecurityGate> {
        &self.gate
    }

    pub fn forwarder(&self) -> &ProxyForwarder {
        &self.forwarder
    }

    /// `POST /mcp/invoke`.
    ///
    /// Boundary rejections (auth, quota, content, admin-only) come back as
    /// `Err`; everything else is a JSON-RPC envelope.
    pub async fn handle_invoke(&self, inbound: Inbound<'_>) -> Result<BridgeReply> {
        let request = match RpcRequest::parse(inbound.body) {
            Ok(request) => request,
            Err(rejection) => {
                let admission =
                    self.gate
                        .admit(inbound.headers, inbound.peer, AuthRequirement::Open)?;
                debug!(code = rejection.error.code, "Rejected malformed envelope");
                return Ok(BridgeReply::new(
                    ReplyBody::Envelope(rejection.into_response()),
                    Some(admission.quota),
                ));
            }
        };

        let method = RpcMethod::parse(&request.method);
        let requirement = match method {
            Some(m) if m.requires_auth() => AuthRequirement::Required,
            _ => AuthRequirement::Open,
        };
        let admission = self.gate.admit(inbound.headers, inbound.peer, requirement)?;

        let Some(method) = method else {
            debug!(method = %request.method, "Unknown JSON-RPC method");
            let err = RpcError::method_not_found(
                format!("Method not found: {}", request.method),
                json!({ "available_methods": RpcMethod::names() }),
            );
            return Ok(BridgeReply::new(
                ReplyBody::Envelope(RpcResponse::failure(request.id, err)),
                Some(admission.quota),
            ));
        };

        let body = match method {
            RpcMethod::ToolsCall => self.call_tool(request, &admission).await?,
            RpcMethod::ResourcesGet => ReplyBody::Envelope(self.read_resource(&request)),
            listing => {
                let payload = self.listing(listing).unwrap_or_else(|| json!({}));
                ReplyBody::Envelope(RpcResponse::success(request.id, payload))
            }
        };

        Ok(BridgeReply::new(body, Some(admission.quota)))
    }

    /// `POST /mcp/proxy`: authenticated, sanitized, then relayed without
    /// consulting the local catalog.
    pub async fn handle_proxy(&self, inbound: Inbound<'_>) -> Result<BridgeReply> {
        let request = match RpcRequest::parse(inbound.body) {
            Ok(request) => request,
            Err(rejection) => {
                let admission =
                    self.gate
                        .admit(inbound.headers, inbound.peer, AuthRequirement::Open)?;
                return Ok(BridgeReply::new(
                    ReplyBody::Envelope(rejection.into_response()),
                    Some(admission.quota),
                ));
            }
        };

        let admission = self
            .gate
            .admit(inbound.headers, inbound.peer, AuthRequirement::Required)?;
        if let Some(arguments) = request.params.get("arguments") {
            self.gate
                .sanitize(arguments)
                .map_err(|err| err.with_quota(admission.quota.clone()))?;
        }

        let body = self.forward(request).await;
        Ok(BridgeReply::new(body, Some(admission.quota)))
    }

    /// REST discovery (`GET /mcp/tools` and friends), gated like the
    /// corresponding JSON-RPC method.
    pub fn handle_listing(
        &self,
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        method: RpcMethod,
    ) -> Result<BridgeReply> {
        let admission = self.gate.admit(headers, peer, AuthRequirement::Open)?;
        let payload = self.listing(method).unwrap_or_else(|| json!({}));
        Ok(BridgeReply::new(ReplyBody::Raw(payload), Some(admission.quota)))
    }

    fn listing(&self, method: RpcMethod) -> Option<Value> {
        match method {
            RpcMethod::ToolsList => Some(json!({ "tools": self.catalog.registry().list() })),
            RpcMethod::ResourcesList => Some(json!({ "resources": RESOURCES })),
            RpcMethod::PromptsList => Some(json!({ "prompts": PROMPTS })),
            RpcMethod::ToolsCall | RpcMethod::ResourcesGet => None,
        }
    }

    async fn call_tool(&self, request: RpcRequest, admission: &Admission) -> Result<ReplyBody> {
        let id = request.id.clone();

        let Some(name) = request.param_str("name").map(str::to_string) else {
            let err = RpcError::invalid_params(
                "Missing tool name",
                json!({ "violations": [{"path": "name", "reason": "missing_required"}] }),
            );
            return Ok(ReplyBody::Envelope(RpcResponse::failure(id, err)));
        };

        let arguments = match request.params.get("arguments") {
            None | Some(Value::Null) => json!({}),
            Some(args) => args.clone(),
        };

        self.gate
            .sanitize(&arguments)
            .map_err(|err| err.with_quota(admission.quota.clone()))?;

        let registry = self.catalog.registry();
        let Some(descriptor) = registry.describe(&name) else {
            debug!(tool = %name, "Unknown tool requested");
            let err = RpcError::method_not_found(
                format!("Tool not found: {}", name),
                json!({ "tool": name, "available_tools": registry.names() }),
            );
            return Ok(ReplyBody::Envelope(RpcResponse::failure(id, err)));
        };

        if descriptor.admin_only {
            self.gate.require_admin(admission, &name)?;
        }

        let checked = registry
            .validator(&name)
            .map(|validator| validator.validate(&arguments))
            .unwrap_or(Ok(()));
        if let Err(violations) = checked {
            debug!(tool = %name, violations = violations.len(), "Arguments failed validation");
            let err = RpcError::invalid_params(
                format!("Invalid arguments for tool '{}'", name),
                json!({ "tool": name, "violations": violations }),
            );
            return Ok(ReplyBody::Envelope(RpcResponse::failure(id, err)));
        }

        match self.catalog.dispatch().resolve(&name) {
            Resolved::Handler(handler) => Ok(ReplyBody::Envelope(
                self.invoke_local(handler, &name, id, arguments, admission)
                    .await,
            )),
            Resolved::Proxy => Ok(self.forward(request).await),
            Resolved::Unknown => {
                error!(tool = %name, "Registered tool has no dispatch binding");
                Ok(ReplyBody::Envelope(RpcResponse::failure(
                    id,
                    RpcError::internal_error("Tool execution failed", Some(json!({ "tool": name }))),
                )))
            }
        }
    }

    async fn invoke_local(
        &self,
        handler: Arc<dyn ToolHandler>,
        name: &str,
        id: Value,
        arguments: Value,
        admission: &Admission,
    ) -> RpcResponse {
        let started = Instant::now();
        let outcome = AssertUnwindSafe(handler.invoke(arguments))
            .catch_unwind()
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let fault = match outcome {
            Ok(Ok(payload)) => {
                info!(
                    tool = name,
                    identity = %admission.identity,
                    elapsed_ms,
                    success = payload.get("success").and_then(|v| v.as_bool()),
                    "Tool invoked"
                );
                return RpcResponse::success(id, payload);
            }
            Ok(Err(err)) => err.to_string(),
            Err(_) => "handler panicked".to_string(),
        };

        error!(tool = name, elapsed_ms, fault = %fault, "Tool handler failed");
        RpcResponse::failure(
            id,
            RpcError::internal_error("Tool execution failed", Some(json!({ "tool": name }))),
        )
    }

    async fn forward(&self, request: RpcRequest) -> ReplyBody {
        match self.forwarder.forward(&request.raw).await {
            ForwardOutcome::Relayed(upstream) => ReplyBody::Raw(upstream),
            ForwardOutcome::Disabled => ReplyBody::Envelope(RpcResponse::success(
                request.id,
                domain_failure(
                    "MCP proxy is disabled. Set MCP_PROXY_ENABLED=true and MCP_PROXY_URL to enable forwarding",
                    "proxy_disabled",
                ),
            )),
            ForwardOutcome::Failed(err) => ReplyBody::Envelope(RpcResponse::failure(request.id, err)),
        }
    }

    fn read_resource(&self, request: &RpcRequest) -> RpcResponse {
        let id = request.id.clone();
        let Some(uri) = request.param_str("uri") else {
            return RpcResponse::failure(
                id,
                RpcError::invalid_params(
                    "Missing resource uri",
                    json!({ "violations": [{"path": "uri", "reason": "missing_required"}] }),
                ),
            );
        };

        let payload = match uri {
            CATALOG_URI => json!({ "tools": self.catalog.registry().list() }),
            STATUS_URI => self.status(),
            other => {
                return RpcResponse::failure(
                    id,
                    RpcError::invalid_params(
                        format!("Unknown resource: {}", other),
                        json!({ "uri": other, "available_resources": resources::resource_uris() }),
                    ),
                )
            }
        };

        RpcResponse::success(id, resources::resource_contents(uri, &payload))
    }

    pub fn status(&self) -> Value {
        let limiter = self.gate.limiter();
        json!({
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "security_enabled": self.gate.security_enabled(),
            "rate_limit": {
                "limit": limiter.limit(),
                "window_secs": limiter.window().as_secs(),
            },
            "proxy": {
                "enabled": self.forwarder.is_active(),
                "timeout_ms": self.forwarder.timeout().as_millis() as u64,
            },
            "integrations": self.integrations,
            "tool_count": self.catalog.registry().len(),
        })
    }
}

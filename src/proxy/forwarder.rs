use crate::config::ProxyConfig;
use crate::mcp::types::RpcError;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Result of relaying an envelope upstream
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardOutcome {
    /// Upstream answered with a JSON envelope, relayed as-is
    Relayed(Value),
    /// Proxying is switched off or has no target
    Disabled,
    Failed(RpcError),
}

/// Relays validated `tools/call` envelopes to the upstream MCP server
#[derive(Debug, Clone)]
pub struct ProxyForwarder {
    http: Client,
    target: Option<String>,
    timeout: Duration,
}

impl ProxyForwarder {
    pub fn new(http: Client, target: Option<String>, timeout: Duration) -> Self {
        Self {
            http,
            target,
            timeout,
        }
    }

    pub fn from_config(config: &ProxyConfig, http: Client) -> Self {
        let target = if config.enabled {
            config.target_url.clone().filter(|u| !u.is_empty())
        } else {
            None
        };
        Self::new(http, target, Duration::from_secs(config.timeout_secs))
    }

    pub fn is_active(&self) -> bool {
        self.target.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `envelope` unchanged and bound the whole exchange by the timeout
    pub async fn forward(&self, envelope: &Value) -> ForwardOutcome {
        let Some(target) = self.target.as_deref() else {
            debug!("Proxy forwarding requested while disabled");
            return ForwardOutcome::Disabled;
        };

        let exchange = async {
            let response = self.http.post(target).json(envelope).send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = match tokio::time::timeout(self.timeout, exchange).await {
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Upstream MCP server timed out");
                return ForwardOutcome::Failed(RpcError::internal_error(
                    "Upstream MCP server timed out",
                    Some(json!({
                        "reason": "timeout",
                        "timeout_ms": self.timeout.as_millis() as u64,
                    })),
                ));
            }
            Ok(Err(e)) => {
                error!(error = %e.without_url(), "Upstream MCP server unreachable");
                return ForwardOutcome::Failed(RpcError::internal_error(
                    "Upstream MCP server unreachable",
                    Some(json!({ "reason": "connection_failed" })),
                ));
            }
            Ok(Ok(pair)) => pair,
        };

        if !status.is_success() {
            warn!(status = status.as_u16(), "Upstream MCP server returned error status");
            return ForwardOutcome::Failed(RpcError::internal_error(
                "Upstream MCP server returned an error",
                Some(json!({
                    "reason": "upstream_status",
                    "upstream_status": status.as_u16(),
                })),
            ));
        }

        match serde_json::from_slice::<Value>(&body) {
            Ok(value) if value.is_object() => ForwardOutcome::Relayed(value),
            _ => {
                warn!(status = status.as_u16(), "Upstream MCP server returned a non-JSON body");
                ForwardOutcome::Failed(RpcError::internal_error(
                    "Upstream MCP server returned an invalid response",
                    Some(json!({
                        "reason": "invalid_upstream_response",
                        "upstream_status": status.as_u16(),
                    })),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::types::codes;
    use httpmock::prelude::*;

    fn envelope() -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 11,
            "method": "tools/call",
            "params": {"name": "im.v1.message.create", "arguments": {"receive_id": "oc_1", "content": "{}"}}
        })
    }

    #[tokio::test]
    async fn test_disabled_forwarder() {
        let forwarder = ProxyForwarder::from_config(&ProxyConfig::default(), Client::new());
        assert!(!forwarder.is_active());
        assert_eq!(forwarder.forward(&envelope()).await, ForwardOutcome::Disabled);
    }

    #[tokio::test]
    async fn test_relays_envelope_verbatim() {
        let server = MockServer::start_async().await;
        let upstream = json!({"jsonrpc": "2.0", "id": 11, "result": {"message_id": "om_9"}});
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/mcp").json_body(envelope());
                then.status(200).json_body(upstream.clone());
            })
            .await;

        let forwarder = ProxyForwarder::new(
            Client::new(),
            Some(server.url("/mcp")),
            Duration::from_secs(5),
        );
        let outcome = forwarder.forward(&envelope()).await;

        mock.assert_async().await;
        assert_eq!(outcome, ForwardOutcome::Relayed(upstream));
    }

    #[tokio::test]
    async fn test_upstream_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/mcp");
                then.status(503).body("maintenance");
            })
            .await;

        let forwarder = ProxyForwarder::new(
            Client::new(),
            Some(server.url("/mcp")),
            Duration::from_secs(5),
        );
        match forwarder.forward(&envelope()).await {
            ForwardOutcome::Failed(err) => {
                assert_eq!(err.code, codes::INTERNAL_ERROR);
                assert_eq!(err.data.unwrap()["upstream_status"], 503);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_internal_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/mcp");
                then.status(200)
                    .delay(Duration::from_millis(500))
                    .json_body(json!({"jsonrpc": "2.0", "id": 11, "result": {}}));
            })
            .await;

        let forwarder = ProxyForwarder::new(
            Client::new(),
            Some(server.url("/mcp")),
            Duration::from_millis(100),
        );
        match forwarder.forward(&envelope()).await {
            ForwardOutcome::Failed(err) => {
                assert_eq!(err.code, codes::INTERNAL_ERROR);
                assert_eq!(err.data.unwrap()["reason"], "timeout");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/mcp");
                then.status(200).body("<html>ok</html>");
            })
            .await;

        let forwarder = ProxyForwarder::new(
            Client::new(),
            Some(server.url("/mcp")),
            Duration::from_secs(5),
        );
        match forwarder.forward(&envelope()).await {
            ForwardOutcome::Failed(err) => {
                assert_eq!(err.data.unwrap()["reason"], "invalid_upstream_response");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}

use serde::Serialize;
use serde_json::{json, Value};

pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 error codes used by the bridge
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Methods the bridge understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcMethod {
    ToolsList,
    ToolsCall,
    ResourcesList,
    ResourcesGet,
    PromptsList,
}

impl RpcMethod {
    pub const ALL: [RpcMethod; 5] = [
        RpcMethod::ToolsList,
        RpcMethod::ToolsCall,
        RpcMethod::ResourcesList,
        RpcMethod::ResourcesGet,
        RpcMethod::PromptsList,
    ];

    pub fn parse(method: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == method)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMethod::ToolsList => "tools/list",
            RpcMethod::ToolsCall => "tools/call",
            RpcMethod::ResourcesList => "resources/list",
            RpcMethod::ResourcesGet => "resources/get",
            RpcMethod::PromptsList => "prompts/list",
        }
    }

    /// Discovery stays open; invocation and resource reads need a key
    pub fn requires_auth(&self) -> bool {
        matches!(self, RpcMethod::ToolsCall | RpcMethod::ResourcesGet)
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|m| m.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::new(codes::PARSE_ERROR, "Parse error", Some(json!({ "detail": detail.into() })))
    }

    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::new(
            codes::INVALID_REQUEST,
            "Invalid Request",
            Some(json!({ "detail": detail.into() })),
        )
    }

    pub fn method_not_found(message: impl Into<String>, data: Value) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, message, Some(data))
    }

    pub fn invalid_params(message: impl Into<String>, data: Value) -> Self {
        Self::new(codes::INVALID_PARAMS, message, Some(data))
    }

    pub fn internal_error(message: impl Into<String>, data: Option<Value>) -> Self {
        Self::new(codes::INTERNAL_ERROR, message, data)
    }
}

/// Outcome of one invocation; serialized as the `result` or `error` member
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum InvocationResult {
    #[serde(rename = "result")]
    Success(Value),
    #[serde(rename = "error")]
    Failure(RpcError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(flatten)]
    pub outcome: InvocationResult,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: InvocationResult::Success(result),
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: InvocationResult::Failure(error),
        }
    }
}

/// A structurally valid envelope. `raw` is kept for verbatim proxying.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub id: Value,
    pub method: String,
    pub params: Value,
    pub raw: Value,
}

/// Why an envelope was refused, with whatever id could be recovered
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeRejection {
    pub id: Value,
    pub error: RpcError,
}

impl EnvelopeRejection {
    fn new(id: Value, error: RpcError) -> Self {
        Self { id, error }
    }

    pub fn into_response(self) -> RpcResponse {
        RpcResponse::failure(self.id, self.error)
    }
}

impl RpcRequest {
    /// Parse raw bytes into an envelope.
    ///
    /// Undecodable JSON and missing `jsonrpc`/`method` members are parse
    /// errors; a present-but-wrong version, a non-object body or a
    /// non-scalar id are invalid requests.
    pub fn parse(body: &[u8]) -> Result<Self, EnvelopeRejection> {
        let raw: Value = serde_json::from_slice(body).map_err(|e| {
            EnvelopeRejection::new(Value::Null, RpcError::parse_error(format!("Invalid JSON: {}", e)))
        })?;

        let Some(obj) = raw.as_object() else {
            return Err(EnvelopeRejection::new(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        let id = match obj.get("id") {
            None => Value::Null,
            Some(id @ (Value::Null | Value::String(_) | Value::Number(_))) => id.clone(),
            Some(_) => {
                return Err(EnvelopeRejection::new(
                    Value::Null,
                    RpcError::invalid_request("id must be a string, number or null"),
                ))
            }
        };

        match obj.get("jsonrpc") {
            None => {
                return Err(EnvelopeRejection::new(
                    id,
                    RpcError::parse_error("Missing 'jsonrpc' field"),
                ))
            }
            Some(Value::String(v)) if v == JSONRPC_VERSION => {}
            Some(_) => {
                return Err(EnvelopeRejection::new(
                    id,
                    RpcError::invalid_request("jsonrpc must be \"2.0\""),
                ))
            }
        }

        let method = match obj.get("method") {
            None => {
                return Err(EnvelopeRejection::new(
                    id,
                    RpcError::parse_error("Missing 'method' field"),
                ))
            }
            Some(Value::String(m)) => m.clone(),
            Some(_) => {
                return Err(EnvelopeRejection::new(
                    id,
                    RpcError::invalid_request("method must be a string"),
                ))
            }
        };

        let params = match obj.get("params") {
            None | Some(Value::Null) => json!({}),
            Some(p @ Value::Object(_)) => p.clone(),
            Some(_) => {
                return Err(EnvelopeRejection::new(
                    id,
                    RpcError::invalid_params(
                        "params must be an object",
                        json!({ "violations": [{"path": "params", "reason": "type_mismatch"}] }),
                    ),
                ))
            }
        };

        Ok(Self {
            id,
            method,
            params,
            raw,
        })
    }

    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }
}

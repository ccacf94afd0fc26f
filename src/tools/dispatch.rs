use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Capability bound to a local tool.
///
/// `Ok` carries the tool's payload, including domain failures such as a
/// rejected vendor call. `Err` is reserved for faults inside the handler.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, arguments: Value) -> Result<Value>;
}

#[derive(Clone)]
pub enum ToolBinding {
    Local(Arc<dyn ToolHandler>),
    /// Forward the whole envelope to the upstream MCP server
    Proxy,
}

impl fmt::Debug for ToolBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolBinding::Local(_) => f.write_str("Local(..)"),
            ToolBinding::Proxy => f.write_str("Proxy"),
        }
    }
}

pub enum Resolved {
    Handler(Arc<dyn ToolHandler>),
    Proxy,
    Unknown,
}

/// Tool name to binding, built once at startup
#[derive(Debug, Default)]
pub struct DispatchTable {
    bindings: HashMap<String, ToolBinding>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, binding: ToolBinding) -> Result<()> {
        let name = name.into();
        if self.bindings.contains_key(&name) {
            return Err(BridgeError::Config(format!(
                "Tool '{}' is bound twice",
                name
            )));
        }
        self.bindings.insert(name, binding);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Resolved {
        match self.bindings.get(name) {
            Some(ToolBinding::Local(handler)) => Resolved::Handler(Arc::clone(handler)),
            Some(ToolBinding::Proxy) => Resolved::Proxy,
            None => Resolved::Unknown,
        }
    }

    pub fn is_proxied(&self, name: &str) -> bool {
        matches!(self.bindings.get(name), Some(ToolBinding::Proxy))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn invoke(&self, arguments: Value) -> Result<Value> {
            Ok(arguments)
        }
    }

    #[tokio::test]
    async fn test_resolve_local() {
        let mut table = DispatchTable::new();
        table.bind("echo", ToolBinding::Local(Arc::new(Echo))).unwrap();

        match table.resolve("echo") {
            Resolved::Handler(handler) => {
                let out = handler.invoke(json!({"x": 1})).await.unwrap();
                assert_eq!(out, json!({"x": 1}));
            }
            _ => panic!("expected local handler"),
        }
    }

    #[test]
    fn test_resolve_proxy_and_unknown() {
        let mut table = DispatchTable::new();
        table.bind("im.v1.message.create", ToolBinding::Proxy).unwrap();

        assert!(matches!(table.resolve("im.v1.message.create"), Resolved::Proxy));
        assert!(table.is_proxied("im.v1.message.create"));
        assert!(matches!(table.resolve("nope"), Resolved::Unknown));
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let mut table = DispatchTable::new();
        table.bind("a", ToolBinding::Proxy).unwrap();
        assert!(table.bind("a", ToolBinding::Proxy).is_err());
        assert_eq!(table.len(), 1);
    }
}

use crate::error::{BridgeError, Result};
use crate::schema::{ArgumentValidator, SchemaNode};
use serde::Serialize;
use std::collections::HashMap;

/// Advertised contract of one tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub argument_schema: SchemaNode,
    #[serde(skip)]
    pub admin_only: bool,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: SchemaNode) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            argument_schema: schema,
            admin_only: false,
        }
    }

    pub fn admin_only(mut self) -> Self {
        self.admin_only = true;
        self
    }
}

/// Tool descriptors in registration order, immutable after startup.
///
/// Each descriptor's argument schema is compiled once here; a schema that
/// fails to compile is a startup error.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    tools: Vec<ToolDescriptor>,
    validators: Vec<ArgumentValidator>,
    index: HashMap<String, usize>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<()> {
        if self.index.contains_key(&descriptor.name) {
            return Err(BridgeError::Config(format!(
                "Tool '{}' is registered twice",
                descriptor.name
            )));
        }
        descriptor
            .argument_schema
            .check_invariants()
            .map_err(|e| {
                BridgeError::Config(format!("Invalid schema for tool '{}': {}", descriptor.name, e))
            })?;
        let validator = ArgumentValidator::compile(&descriptor.argument_schema).map_err(|e| {
            BridgeError::Config(format!("Invalid schema for tool '{}': {}", descriptor.name, e))
        })?;

        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(descriptor);
        self.validators.push(validator);
        Ok(())
    }

    pub fn describe(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn validator(&self, name: &str) -> Option<&ArgumentValidator> {
        self.index.get(name).map(|&i| &self.validators[i])
    }

    pub fn list(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor::new(
            name,
            "test tool",
            SchemaNode::object().property("q", SchemaNode::string()),
        )
    }

    #[test]
    fn test_register_and_describe() {
        let mut registry = SchemaRegistry::new();
        registry.register(descriptor("a")).unwrap();
        registry.register(descriptor("b")).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.describe("b").unwrap().name, "b");
        assert!(registry.describe("c").is_none());
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register(descriptor("a")).unwrap();
        let err = registry.register(descriptor("a")).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_broken_schema_rejected() {
        let mut registry = SchemaRegistry::new();
        let bad = ToolDescriptor::new("bad", "x", SchemaNode::object().require(&["ghost"]));
        assert!(registry.register(bad).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_validator_compiled_per_tool() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(ToolDescriptor::new(
                "send",
                "x",
                SchemaNode::object()
                    .property("text", SchemaNode::string())
                    .require(&["text"]),
            ))
            .unwrap();

        let validator = registry.validator("send").unwrap();
        assert!(validator.validate(&serde_json::json!({"text": "hi"})).is_ok());
        let violations = validator.validate(&serde_json::json!({})).unwrap_err();
        assert_eq!(violations[0].path, "text");
        assert!(registry.validator("other").is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(descriptor("a").admin_only()).unwrap();
        assert_eq!(value["name"], "a");
        assert_eq!(value["inputSchema"]["type"], "object");
        assert!(value.get("admin_only").is_none());
    }
}

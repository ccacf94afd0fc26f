use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::fmt;

/// JSON value kinds a schema node can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    Object,
    String,
    Integer,
    Number,
    Boolean,
    Array,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Object => "object",
            SchemaType::String => "string",
            SchemaType::Integer => "integer",
            SchemaType::Number => "number",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
        }
    }

    /// Name of the runtime type of `value`, in schema vocabulary
    pub fn describe_value(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Argument contract for a tool, or for one property inside it.
///
/// Properties keep their declaration order so validation output and the
/// advertised schema are deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub schema_type: SchemaType,
    pub description: Option<String>,
    pub properties: Vec<(String, SchemaNode)>,
    pub required: Vec<String>,
    pub enum_values: Option<Vec<Value>>,
    pub default: Option<Value>,
    pub items: Option<Box<SchemaNode>>,
    /// `false` marks a closed object: unknown properties are violations
    pub additional_properties: bool,
}

impl SchemaNode {
    fn of(schema_type: SchemaType) -> Self {
        Self {
            schema_type,
            description: None,
            properties: Vec::new(),
            required: Vec::new(),
            enum_values: None,
            default: None,
            items: None,
            additional_properties: true,
        }
    }

    pub fn object() -> Self {
        Self::of(SchemaType::Object)
    }

    pub fn string() -> Self {
        Self::of(SchemaType::String)
    }

    pub fn integer() -> Self {
        Self::of(SchemaType::Integer)
    }

    pub fn number() -> Self {
        Self::of(SchemaType::Number)
    }

    pub fn boolean() -> Self {
        Self::of(SchemaType::Boolean)
    }

    pub fn array(items: SchemaNode) -> Self {
        let mut node = Self::of(SchemaType::Array);
        node.items = Some(Box::new(items));
        node
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn property(mut self, name: impl Into<String>, node: SchemaNode) -> Self {
        self.properties.push((name.into(), node));
        self
    }

    pub fn require(mut self, names: &[&str]) -> Self {
        self.required.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn closed(mut self) -> Self {
        self.additional_properties = false;
        self
    }

    pub fn property_schema(&self, name: &str) -> Option<&SchemaNode> {
        self.properties
            .iter()
            .find(|(prop, _)| prop == name)
            .map(|(_, node)| node)
    }

    /// Every required name must be a declared property, at every depth
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        for name in &self.required {
            if self.property_schema(name).is_none() {
                return Err(format!(
                    "required property '{}' is not declared in properties",
                    name
                ));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for (name, node) in &self.properties {
            if !seen.insert(name.as_str()) {
                return Err(format!("property '{}' is declared twice", name));
            }
            node.check_invariants()
                .map_err(|e| format!("{}: {}", name, e))?;
        }

        if let Some(items) = &self.items {
            items.check_invariants().map_err(|e| format!("items: {}", e))?;
        }

        Ok(())
    }

    /// Render as a JSON-Schema compatible object
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".to_string(), json!(self.schema_type.as_str()));

        if let Some(description) = &self.description {
            out.insert("description".to_string(), json!(description));
        }

        if self.schema_type == SchemaType::Object {
            let properties: Map<String, Value> = self
                .properties
                .iter()
                .map(|(name, node)| (name.clone(), node.to_json()))
                .collect();
            out.insert("properties".to_string(), Value::Object(properties));
            out.insert("required".to_string(), json!(self.required));
            if !self.additional_properties {
                out.insert("additionalProperties".to_string(), json!(false));
            }
        }

        if let Some(values) = &self.enum_values {
            out.insert("enum".to_string(), json!(values));
        }
        if let Some(default) = &self.default {
            out.insert("default".to_string(), default.clone());
        }
        if let Some(items) = &self.items {
            out.insert("items".to_string(), items.to_json());
        }

        Value::Object(out)
    }
}

impl Serialize for SchemaNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_json_shape() {
        let schema = SchemaNode::object()
            .property("chat_id", SchemaNode::string().describe("Chat ID"))
            .property("page_size", SchemaNode::integer().with_default(20))
            .require(&["chat_id"])
            .closed();

        let rendered = schema.to_json();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["properties"]["chat_id"]["type"], "string");
        assert_eq!(rendered["properties"]["chat_id"]["description"], "Chat ID");
        assert_eq!(rendered["properties"]["page_size"]["default"], 20);
        assert_eq!(rendered["required"], json!(["chat_id"]));
        assert_eq!(rendered["additionalProperties"], false);
    }

    #[test]
    fn test_empty_object_lists_empty_required() {
        let rendered = SchemaNode::object().to_json();
        assert_eq!(rendered["properties"], json!({}));
        assert_eq!(rendered["required"], json!([]));
        assert!(rendered.get("additionalProperties").is_none());
    }

    #[test]
    fn test_enum_and_items_rendered() {
        let schema = SchemaNode::array(SchemaNode::string().one_of(["user", "assistant"]));
        let rendered = schema.to_json();
        assert_eq!(rendered["items"]["enum"], json!(["user", "assistant"]));
    }

    #[test]
    fn test_invariant_required_must_be_declared() {
        let schema = SchemaNode::object()
            .property("text", SchemaNode::string())
            .require(&["chat_id"]);
        let err = schema.check_invariants().unwrap_err();
        assert!(err.contains("chat_id"));
    }

    #[test]
    fn test_invariant_checked_in_nested_nodes() {
        let schema = SchemaNode::object().property(
            "fields",
            SchemaNode::object().require(&["Name"]),
        );
        let err = schema.check_invariants().unwrap_err();
        assert!(err.starts_with("fields:"));
    }

    #[test]
    fn test_duplicate_property_rejected() {
        let schema = SchemaNode::object()
            .property("a", SchemaNode::string())
            .property("a", SchemaNode::integer());
        assert!(schema.check_invariants().is_err());
    }
}

use super::node::{SchemaNode, SchemaType};
use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, Validator};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationReason {
    MissingRequired,
    TypeMismatch,
    EnumMismatch,
    UnexpectedProperty,
}

impl ViolationReason {
    // Missing names first, then per-property findings, then unexpected keys
    fn rank(&self) -> u8 {
        match self {
            ViolationReason::MissingRequired => 0,
            ViolationReason::TypeMismatch | ViolationReason::EnumMismatch => 1,
            ViolationReason::UnexpectedProperty => 2,
        }
    }
}

/// One contract breach, located by a dotted/indexed path such as `records[1].fields`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub path: String,
    pub reason: ViolationReason,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// A tool's argument contract compiled once at registration
pub struct ArgumentValidator {
    schema: SchemaNode,
    compiled: Validator,
}

impl fmt::Debug for ArgumentValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgumentValidator")
            .field("schema", &self.schema.to_json())
            .finish_non_exhaustive()
    }
}

impl ArgumentValidator {
    pub fn compile(schema: &SchemaNode) -> Result<Self, String> {
        let compiled = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&schema.to_json())
            .map_err(|err| format!("failed to compile schema: {err}"))?;

        Ok(Self {
            schema: schema.clone(),
            compiled,
        })
    }

    /// Check `arguments` against the compiled contract.
    ///
    /// Pure: every violation is collected, ordered missing names first, then
    /// type and enum findings, then unexpected keys.
    pub fn validate(&self, arguments: &Value) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();

        for error in self.compiled.iter_errors(arguments) {
            let location = parse_pointer(arguments, &error.instance_path().to_string());

            match error.kind() {
                ValidationErrorKind::Required { property } => {
                    let name = property
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| property.to_string());
                    let mut path = location;
                    path.push(Segment::Key(name.clone()));
                    violations.push(Violation {
                        path: render_path(&path),
                        reason: ViolationReason::MissingRequired,
                        message: format!("missing required property '{}'", name),
                    });
                }
                ValidationErrorKind::AdditionalProperties { unexpected } => {
                    for key in unexpected {
                        let mut path = location.clone();
                        path.push(Segment::Key(key.clone()));
                        violations.push(Violation {
                            path: render_path(&path),
                            reason: ViolationReason::UnexpectedProperty,
                            message: format!("property '{}' is not accepted by this tool", key),
                        });
                    }
                }
                ValidationErrorKind::Enum { options } => violations.push(Violation {
                    path: render_path(&location),
                    reason: ViolationReason::EnumMismatch,
                    message: format!("value must be one of {}", options),
                }),
                ValidationErrorKind::Type { .. } => {
                    let message = match (
                        self.node_at(&location),
                        value_at(arguments, &location),
                    ) {
                        (Some(node), Some(value)) => format!(
                            "expected {}, got {}",
                            node.schema_type,
                            SchemaType::describe_value(value)
                        ),
                        _ => error.to_string(),
                    };
                    violations.push(Violation {
                        path: render_path(&location),
                        reason: ViolationReason::TypeMismatch,
                        message,
                    });
                }
                _ => violations.push(Violation {
                    path: render_path(&location),
                    reason: ViolationReason::TypeMismatch,
                    message: error.to_string(),
                }),
            }
        }

        if violations.is_empty() {
            return Ok(());
        }
        violations.sort_by_key(|v| v.reason.rank());
        Err(violations)
    }

    fn node_at(&self, path: &[Segment]) -> Option<&SchemaNode> {
        path.iter().try_fold(&self.schema, |node, segment| match segment {
            Segment::Key(name) => node.property_schema(name),
            Segment::Index(_) => node.items.as_deref(),
        })
    }
}

fn value_at<'a>(root: &'a Value, path: &[Segment]) -> Option<&'a Value> {
    path.iter().try_fold(root, |value, segment| match segment {
        Segment::Key(name) => value.get(name.as_str()),
        Segment::Index(i) => value.get(*i),
    })
}

// A numeric pointer token is an index only where the instance holds an array.
fn parse_pointer(root: &Value, pointer: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = Some(root);

    for raw in pointer.split('/').skip(1) {
        let token = raw.replace("~1", "/").replace("~0", "~");
        let segment = match (current, token.parse::<usize>()) {
            (Some(Value::Array(_)), Ok(i)) => Segment::Index(i),
            _ => Segment::Key(token),
        };
        current = current.and_then(|value| match &segment {
            Segment::Key(name) => value.get(name.as_str()),
            Segment::Index(i) => value.get(*i),
        });
        segments.push(segment);
    }

    segments
}

fn render_path(path: &[Segment]) -> String {
    if path.is_empty() {
        return "arguments".to_string();
    }

    let mut out = String::new();
    for segment in path {
        match segment {
            Segment::Key(name) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(name);
            }
            Segment::Index(i) => out.push_str(&format!("[{}]", i)),
        }
    }
    out
}

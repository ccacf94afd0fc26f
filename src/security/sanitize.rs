use crate::error::{BridgeError, Result};
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use serde_json::Value;

/// Lark rejects text messages longer than this
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 4000;

static FORBIDDEN_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?is)<script[^>]*>.*?</script>",
        r"(?i)javascript:",
        r"(?i)data:text/html",
        r"(?i)vbscript:",
        r"(?i)\bon\w+\s*=",
    ])
    .expect("forbidden pattern set is valid")
});

static CHAT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("chat id pattern is valid"));

/// Length and injection-signature checks applied to every string argument
#[derive(Debug, Clone)]
pub struct ContentPolicy {
    max_length: usize,
}

impl Default for ContentPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTENT_LENGTH)
    }
}

impl ContentPolicy {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    /// Walk the argument tree and reject the first offending string
    pub fn check_arguments(&self, arguments: &Value) -> Result<()> {
        self.check_value("arguments", None, arguments)
    }

    pub fn check_text(&self, path: &str, text: &str) -> Result<()> {
        if text.chars().count() > self.max_length {
            return Err(BridgeError::InvalidContent(format!(
                "Content too long at '{}' (max {} chars)",
                path, self.max_length
            )));
        }

        if FORBIDDEN_PATTERNS.is_match(text) {
            return Err(BridgeError::InvalidContent(format!(
                "Content contains forbidden patterns at '{}'",
                path
            )));
        }

        Ok(())
    }

    fn check_value(&self, path: &str, key: Option<&str>, value: &Value) -> Result<()> {
        match value {
            Value::String(text) => {
                self.check_text(path, text)?;
                if key == Some("chat_id") && !CHAT_ID.is_match(text.trim()) {
                    return Err(BridgeError::InvalidContent(
                        "Invalid chat ID format (alphanumeric, _, -, . only)".to_string(),
                    ));
                }
                Ok(())
            }
            Value::Array(items) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| self.check_value(&format!("{path}[{i}]"), None, item)),
            Value::Object(map) => map.iter().try_for_each(|(name, item)| {
                self.check_value(&format!("{path}.{name}"), Some(name), item)
            }),
            _ => Ok(()),
        }
    }
}

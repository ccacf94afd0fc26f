use serde::Serialize;
use serde_json::{json, Value};

pub const CATALOG_URI: &str = "bridge://catalog";
pub const STATUS_URI: &str = "bridge://status";

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResourceDescriptor {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "mimeType")]
    pub mime_type: &'static str,
}

pub const RESOURCES: [ResourceDescriptor; 2] = [
    ResourceDescriptor {
        uri: CATALOG_URI,
        name: "Tool catalog",
        description: "Every tool the bridge exposes, with argument schemas",
        mime_type: "application/json",
    },
    ResourceDescriptor {
        uri: STATUS_URI,
        name: "Bridge status",
        description: "Security, rate-limit, proxy and integration state",
        mime_type: "application/json",
    },
];

pub fn resource_uris() -> Vec<&'static str> {
    RESOURCES.iter().map(|r| r.uri).collect()
}

/// `{contents: [...]}` body for a resource read
pub fn resource_contents(uri: &str, payload: &Value) -> Value {
    json!({
        "contents": [{
            "uri": uri,
            "mimeType": "application/json",
            "text": payload.to_string(),
        }]
    })
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PromptArgument {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: &'static [PromptArgument],
}

pub const PROMPTS: [PromptTemplate; 3] = [
    PromptTemplate {
        name: "notify_chat",
        description: "Draft and send a short status update to a Lark or Telegram chat",
        arguments: &[
            PromptArgument {
                name: "chat_id",
                description: "Target chat",
                required: true,
            },
            PromptArgument {
                name: "topic",
                description: "What the update is about",
                required: true,
            },
        ],
    },
    PromptTemplate {
        name: "query_bitable",
        description: "Find records in a Bitable table that match a plain-language question",
        arguments: &[
            PromptArgument {
                name: "app_token",
                description: "Base application token",
                required: true,
            },
            PromptArgument {
                name: "table_id",
                description: "Table identifier",
                required: true,
            },
            PromptArgument {
                name: "question",
                description: "What to look for",
                required: true,
            },
        ],
    },
    PromptTemplate {
        name: "summarize_departments",
        description: "List the organization's departments and summarize the structure",
        arguments: &[PromptArgument {
            name: "parent_department_id",
            description: "Department to start from, 0 for the root",
            required: false,
        }],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_uris() {
        assert_eq!(resource_uris(), vec![CATALOG_URI, STATUS_URI]);
    }

    #[test]
    fn test_contents_embed_payload_as_text() {
        let body = resource_contents(STATUS_URI, &json!({"proxy_enabled": false}));
        let text = body["contents"][0]["text"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["proxy_enabled"], false);
        assert_eq!(body["contents"][0]["uri"], STATUS_URI);
    }

    #[test]
    fn test_prompts_serialize() {
        let value = serde_json::to_value(PROMPTS).unwrap();
        assert_eq!(value[1]["name"], "query_bitable");
        assert_eq!(value[2]["arguments"][0]["required"], false);
    }
}

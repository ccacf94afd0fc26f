use super::dispatch::ToolHandler;
use crate::error::{BridgeError, Result};
use crate::vendor::lark::RecordQuery;
use crate::vendor::{LarkClient, TelegramClient, VendorError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const DEFAULT_USER_ID_TYPE: &str = "user_id";

pub fn domain_success(message: impl Into<String>, data: Value) -> Value {
    json!({
        "success": true,
        "message": message.into(),
        "data": data,
    })
}

pub fn domain_failure(message: impl Into<String>, error: &str) -> Value {
    json!({
        "success": false,
        "message": message.into(),
        "error": error,
    })
}

fn vendor_failure(action: &str, err: &VendorError) -> Value {
    tracing::warn!(action, error = %err, "Vendor call failed");
    domain_failure(format!("Failed to {}: {}", action, err), err.kind())
}

/// Lark wraps results in `{code, msg, data}`; tools only return `data`
fn lark_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
        other => other,
    }
}

// Arguments were validated against the tool schema before dispatch, so a
// missing required value here is a fault in the bridge rather than the caller.
fn required_str<'a>(arguments: &'a Value, name: &str) -> Result<&'a str> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::HandlerFault(format!("argument '{}' missing after validation", name)))
}

fn optional_str<'a>(arguments: &'a Value, name: &str) -> Option<&'a str> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn page_size(arguments: &Value, default: u64) -> u64 {
    arguments
        .get("page_size")
        .and_then(Value::as_u64)
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

fn user_id_type(arguments: &Value) -> &str {
    optional_str(arguments, "user_id_type").unwrap_or(DEFAULT_USER_ID_TYPE)
}

pub struct SendLarkMessage {
    lark: Arc<LarkClient>,
}

impl SendLarkMessage {
    pub fn new(lark: Arc<LarkClient>) -> Self {
        Self { lark }
    }
}

#[async_trait]
impl ToolHandler for SendLarkMessage {
    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let chat_id = required_str(&arguments, "chat_id")?.trim();
        let text = required_str(&arguments, "text")?.trim();

        if text.is_empty() {
            return Ok(domain_failure("Message text cannot be empty", "invalid_input"));
        }

        match self.lark.send_text(chat_id, text).await {
            Ok(body) => {
                info!(chat_id, "Lark message sent");
                Ok(domain_success(
                    format!("Message sent to Lark chat {}", chat_id),
                    lark_data(body),
                ))
            }
            Err(err) => Ok(vendor_failure("send Lark message", &err)),
        }
    }
}

pub struct SendTelegramMessage {
    telegram: Arc<TelegramClient>,
}

impl SendTelegramMessage {
    pub fn new(telegram: Arc<TelegramClient>) -> Self {
        Self { telegram }
    }
}

#[async_trait]
impl ToolHandler for SendTelegramMessage {
    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let chat_id = required_str(&arguments, "chat_id")?.trim();
        let text = required_str(&arguments, "text")?.trim();

        if text.is_empty() {
            return Ok(domain_failure("Message text cannot be empty", "invalid_input"));
        }

        match self.telegram.send_message(chat_id, text).await {
            Ok(body) => {
                info!(chat_id, "Telegram message sent");
                let result = body.get("result").cloned().unwrap_or(Value::Null);
                Ok(domain_success(
                    format!("Message sent to Telegram chat {}", chat_id),
                    result,
                ))
            }
            Err(err) => Ok(vendor_failure("send Telegram message", &err)),
        }
    }
}

pub struct ListDepartments {
    lark: Arc<LarkClient>,
}

impl ListDepartments {
    pub fn new(lark: Arc<LarkClient>) -> Self {
        Self { lark }
    }
}

#[async_trait]
impl ToolHandler for ListDepartments {
    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let parent = optional_str(&arguments, "parent_department_id").unwrap_or("0");
        let size = page_size(&arguments, 50);

        match self.lark.list_departments(parent, size).await {
            Ok(body) => {
                let data = lark_data(body);
                let count = data
                    .get("items")
                    .and_then(Value::as_array)
                    .map(|items| items.len())
                    .unwrap_or(0);
                Ok(domain_success(format!("Found {} departments", count), data))
            }
            Err(err) => Ok(vendor_failure("list departments", &err)),
        }
    }
}

/// Bitable operations exposed as individual tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitableOp {
    ListTables,
    ListFields,
    ListRecords,
    GetRecord,
    CreateRecord,
    UpdateRecord,
    DeleteRecord,
    BatchCreateRecords,
    SearchRecords,
}

impl BitableOp {
    fn action(&self) -> &'static str {
        match self {
            BitableOp::ListTables => "list tables",
            BitableOp::ListFields => "list fields",
            BitableOp::ListRecords => "list records",
            BitableOp::GetRecord => "get record",
            BitableOp::CreateRecord => "create record",
            BitableOp::UpdateRecord => "update record",
            BitableOp::DeleteRecord => "delete record",
            BitableOp::BatchCreateRecords => "batch create records",
            BitableOp::SearchRecords => "search records",
        }
    }
}

pub struct BitableTool {
    lark: Arc<LarkClient>,
    op: BitableOp,
}

impl BitableTool {
    pub fn new(lark: Arc<LarkClient>, op: BitableOp) -> Self {
        Self { lark, op }
    }

    async fn call(&self, arguments: &Value) -> Result<std::result::Result<Value, VendorError>> {
        let app = required_str(arguments, "app_token")?;

        let outcome = match self.op {
            BitableOp::ListTables => {
                self.lark
                    .list_tables(
                        app,
                        optional_str(arguments, "page_token"),
                        page_size(arguments, DEFAULT_PAGE_SIZE),
                    )
                    .await
            }
            BitableOp::ListFields => {
                let table = required_str(arguments, "table_id")?;
                self.lark
                    .list_fields(
                        app,
                        table,
                        optional_str(arguments, "view_id"),
                        page_size(arguments, DEFAULT_PAGE_SIZE),
                    )
                    .await
            }
            BitableOp::ListRecords => {
                let table = required_str(arguments, "table_id")?;
                let query = RecordQuery {
                    view_id: optional_str(arguments, "view_id").map(str::to_string),
                    filter: optional_str(arguments, "filter").map(str::to_string),
                    sort: optional_str(arguments, "sort").map(str::to_string),
                    page_size: Some(page_size(arguments, DEFAULT_PAGE_SIZE)),
                    page_token: optional_str(arguments, "page_token").map(str::to_string),
                };
                self.lark.list_records(app, table, &query).await
            }
            BitableOp::GetRecord => {
                let table = required_str(arguments, "table_id")?;
                let record = required_str(arguments, "record_id")?;
                self.lark
                    .get_record(app, table, record, user_id_type(arguments))
                    .await
            }
            BitableOp::CreateRecord => {
                let table = required_str(arguments, "table_id")?;
                let fields = arguments.get("fields").cloned().unwrap_or_else(|| json!({}));
                self.lark
                    .create_record(app, table, fields, user_id_type(arguments))
                    .await
            }
            BitableOp::UpdateRecord => {
                let table = required_str(arguments, "table_id")?;
                let record = required_str(arguments, "record_id")?;
                let fields = arguments.get("fields").cloned().unwrap_or_else(|| json!({}));
                self.lark
                    .update_record(app, table, record, fields, user_id_type(arguments))
                    .await
            }
            BitableOp::DeleteRecord => {
                let table = required_str(arguments, "table_id")?;
                let record = required_str(arguments, "record_id")?;
                self.lark.delete_record(app, table, record).await
            }
            BitableOp::BatchCreateRecords => {
                let table = required_str(arguments, "table_id")?;
                let records = arguments
                    .get("records")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                self.lark
                    .batch_create_records(app, table, &records, user_id_type(arguments))
                    .await
            }
            BitableOp::SearchRecords => {
                let table = required_str(arguments, "table_id")?;
                let filter = required_str(arguments, "filter")?;
                let size = arguments.get("page_size").and_then(Value::as_u64);
                self.lark
                    .search_records(app, table, filter, optional_str(arguments, "sort"), size)
                    .await
            }
        };

        Ok(outcome)
    }
}

#[async_trait]
impl ToolHandler for BitableTool {
    async fn invoke(&self, arguments: Value) -> Result<Value> {
        if self.op == BitableOp::BatchCreateRecords
            && arguments
                .get("records")
                .and_then(Value::as_array)
                .map(|r| r.is_empty())
                .unwrap_or(true)
        {
            return Ok(domain_failure("records must not be empty", "invalid_input"));
        }

        match self.call(&arguments).await? {
            Ok(body) => Ok(domain_success(
                format!("Bitable {} succeeded", self.op.action()),
                lark_data(body),
            )),
            Err(err) => Ok(vendor_failure(self.op.action(), &err)),
        }
    }
}

/// Appends one conversation turn to a Bitable table used as a transcript log
pub struct LogConversation {
    lark: Arc<LarkClient>,
}

impl LogConversation {
    pub fn new(lark: Arc<LarkClient>) -> Self {
        Self { lark }
    }
}

#[async_trait]
impl ToolHandler for LogConversation {
    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let app = required_str(&arguments, "app_token")?;
        let table = required_str(&arguments, "table_id")?;
        let session = required_str(&arguments, "session_id")?;
        let role = required_str(&arguments, "role")?;
        let content = required_str(&arguments, "content")?;

        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        let fields = json!({
            "Session ID": session,
            "Role": role,
            "Content": content,
            "Timestamp": timestamp_ms,
        });

        match self
            .lark
            .create_record(app, table, fields, DEFAULT_USER_ID_TYPE)
            .await
        {
            Ok(body) => Ok(domain_success(
                format!("Logged {} turn for session {}", role, session),
                lark_data(body),
            )),
            Err(err) => Ok(vendor_failure("log conversation", &err)),
        }
    }
}

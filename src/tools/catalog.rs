use super::dispatch::{DispatchTable, ToolBinding, ToolHandler};
use super::handlers::{
    BitableOp, BitableTool, ListDepartments, LogConversation, SendLarkMessage,
    SendTelegramMessage, DEFAULT_PAGE_SIZE, DEFAULT_USER_ID_TYPE,
};
use super::registry::{SchemaRegistry, ToolDescriptor};
use crate::error::Result;
use crate::schema::SchemaNode;
use crate::vendor::{LarkClient, TelegramClient};
use std::sync::Arc;

/// Registry and dispatch table built together, so every advertised tool
/// has exactly one binding.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    registry: SchemaRegistry,
    dispatch: DispatchTable,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ToolDescriptor, binding: ToolBinding) -> Result<()> {
        let name = descriptor.name.clone();
        self.registry.register(descriptor)?;
        self.dispatch.bind(name, binding)
    }

    pub fn register_local(
        &mut self,
        descriptor: ToolDescriptor,
        handler: impl ToolHandler + 'static,
    ) -> Result<()> {
        self.register(descriptor, ToolBinding::Local(Arc::new(handler)))
    }

    pub fn register_proxy(&mut self, descriptor: ToolDescriptor) -> Result<()> {
        self.register(descriptor, ToolBinding::Proxy)
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }
}

fn app_token() -> SchemaNode {
    SchemaNode::string().describe("Base application token")
}

fn table_id() -> SchemaNode {
    SchemaNode::string().describe("Table identifier")
}

fn record_id() -> SchemaNode {
    SchemaNode::string().describe("Record identifier")
}

fn page_size(what: &str) -> SchemaNode {
    SchemaNode::integer()
        .describe(format!("Number of {} per page", what))
        .with_default(DEFAULT_PAGE_SIZE)
}

fn page_token() -> SchemaNode {
    SchemaNode::string().describe("Page token for pagination")
}

fn user_id_type() -> SchemaNode {
    SchemaNode::string()
        .describe("User ID type")
        .one_of(["user_id", "open_id", "union_id"])
        .with_default(DEFAULT_USER_ID_TYPE)
}

fn message_tool(service: &str) -> SchemaNode {
    SchemaNode::object()
        .property(
            "chat_id",
            SchemaNode::string().describe(format!("{} chat ID to send the message to", service)),
        )
        .property("text", SchemaNode::string().describe("Message text"))
        .require(&["chat_id", "text"])
        .closed()
}

/// Local Lark/Telegram tools plus the dotted names served by the upstream MCP server
pub fn builtin_catalog(lark: Arc<LarkClient>, telegram: Arc<TelegramClient>) -> Result<ToolCatalog> {
    let mut catalog = ToolCatalog::new();

    catalog.register_local(
        ToolDescriptor::new(
            "send_lark_message",
            "Send a text message to a Lark/Feishu chat",
            message_tool("Lark"),
        ),
        SendLarkMessage::new(lark.clone()),
    )?;

    catalog.register_local(
        ToolDescriptor::new(
            "send_telegram_message",
            "Send a text message to a Telegram chat",
            message_tool("Telegram"),
        ),
        SendTelegramMessage::new(telegram),
    )?;

    catalog.register_local(
        ToolDescriptor::new(
            "list_departments",
            "List departments in the Lark organization",
            SchemaNode::object()
                .property(
                    "parent_department_id",
                    SchemaNode::string()
                        .describe("Parent department ID, 0 for the root")
                        .with_default("0"),
                )
                .property(
                    "page_size",
                    SchemaNode::integer()
                        .describe("Number of departments per page")
                        .with_default(50),
                ),
        ),
        ListDepartments::new(lark.clone()),
    )?;

    catalog.register_local(
        ToolDescriptor::new(
            "bitable_list_tables",
            "List all tables in a Lark Base application",
            SchemaNode::object()
                .property("app_token", app_token())
                .property("page_token", page_token())
                .property("page_size", page_size("tables"))
                .require(&["app_token"]),
        ),
        BitableTool::new(lark.clone(), BitableOp::ListTables),
    )?;

    catalog.register_local(
        ToolDescriptor::new(
            "bitable_list_fields",
            "List all fields in a table with their properties and types",
            SchemaNode::object()
                .property("app_token", app_token())
                .property("table_id", table_id())
                .property("view_id", SchemaNode::string().describe("View identifier"))
                .property("page_size", page_size("fields"))
                .require(&["app_token", "table_id"]),
        ),
        BitableTool::new(lark.clone(), BitableOp::ListFields),
    )?;

    catalog.register_local(
        ToolDescriptor::new(
            "bitable_list_records",
            "List records from a Lark Base table with filtering and pagination",
            SchemaNode::object()
                .property("app_token", app_token())
                .property("table_id", table_id())
                .property("view_id", SchemaNode::string().describe("View identifier"))
                .property("filter", SchemaNode::string().describe("Filter formula"))
                .property("sort", SchemaNode::string().describe("Sort configuration"))
                .property("page_size", page_size("records"))
                .property("page_token", page_token())
                .require(&["app_token", "table_id"]),
        ),
        BitableTool::new(lark.clone(), BitableOp::ListRecords),
    )?;

    catalog.register_local(
        ToolDescriptor::new(
            "bitable_get_record",
            "Get a specific record by ID from a Lark Base table",
            SchemaNode::object()
                .property("app_token", app_token())
                .property("table_id", table_id())
                .property("record_id", record_id())
                .property("user_id_type", user_id_type())
                .require(&["app_token", "table_id", "record_id"]),
        ),
        BitableTool::new(lark.clone(), BitableOp::GetRecord),
    )?;

    catalog.register_local(
        ToolDescriptor::new(
            "bitable_create_record",
            "Create a new record in a Lark Base table",
            SchemaNode::object()
                .property("app_token", app_token())
                .property("table_id", table_id())
                .property(
                    "fields",
                    SchemaNode::object().describe("Record field data as key-value pairs"),
                )
                .property("user_id_type", user_id_type())
                .require(&["app_token", "table_id", "fields"]),
        ),
        BitableTool::new(lark.clone(), BitableOp::CreateRecord),
    )?;

    catalog.register_local(
        ToolDescriptor::new(
            "bitable_update_record",
            "Update an existing record in a Lark Base table",
            SchemaNode::object()
                .property("app_token", app_token())
                .property("table_id", table_id())
                .property("record_id", record_id())
                .property(
                    "fields",
                    SchemaNode::object().describe("Updated field data as key-value pairs"),
                )
                .property("user_id_type", user_id_type())
                .require(&["app_token", "table_id", "record_id", "fields"]),
        ),
        BitableTool::new(lark.clone(), BitableOp::UpdateRecord),
    )?;

    catalog.register_local(
        ToolDescriptor::new(
            "bitable_delete_record",
            "Delete a record from a Lark Base table",
            SchemaNode::object()
                .property("app_token", app_token())
                .property("table_id", table_id())
                .property("record_id", record_id())
                .require(&["app_token", "table_id", "record_id"]),
        )
        .admin_only(),
        BitableTool::new(lark.clone(), BitableOp::DeleteRecord),
    )?;

    catalog.register_local(
        ToolDescriptor::new(
            "bitable_batch_create_records",
            "Create multiple records in a Lark Base table in a single operation",
            SchemaNode::object()
                .property("app_token", app_token())
                .property("table_id", table_id())
                .property(
                    "records",
                    SchemaNode::array(SchemaNode::object())
                        .describe("Field maps, one per record to create"),
                )
                .property("user_id_type", user_id_type())
                .require(&["app_token", "table_id", "records"]),
        ),
        BitableTool::new(lark.clone(), BitableOp::BatchCreateRecords),
    )?;

    catalog.register_local(
        ToolDescriptor::new(
            "bitable_search_records",
            "Search records in a Lark Base table with a filter formula",
            SchemaNode::object()
                .property("app_token", app_token())
                .property("table_id", table_id())
                .property("filter", SchemaNode::string().describe("Search filter formula"))
                .property("sort", SchemaNode::string().describe("Sort configuration"))
                .property("page_size", page_size("records"))
                .require(&["app_token", "table_id", "filter"]),
        ),
        BitableTool::new(lark.clone(), BitableOp::SearchRecords),
    )?;

    catalog.register_local(
        ToolDescriptor::new(
            "log_conversation",
            "Append a conversation turn to a Bitable transcript table",
            SchemaNode::object()
                .property("app_token", app_token())
                .property("table_id", table_id())
                .property("session_id", SchemaNode::string().describe("Conversation session ID"))
                .property(
                    "role",
                    SchemaNode::string()
                        .describe("Speaker of this turn")
                        .one_of(["user", "assistant", "system"]),
                )
                .property("content", SchemaNode::string().describe("Turn text"))
                .require(&["app_token", "table_id", "session_id", "role", "content"]),
        ),
        LogConversation::new(lark),
    )?;

    catalog.register_proxy(ToolDescriptor::new(
        "im.v1.message.create",
        "Send a message through the upstream Lark MCP server",
        SchemaNode::object()
            .property(
                "receive_id_type",
                SchemaNode::string()
                    .one_of(["chat_id", "open_id", "user_id", "union_id", "email"])
                    .with_default("chat_id"),
            )
            .property("receive_id", SchemaNode::string().describe("Recipient ID"))
            .property(
                "msg_type",
                SchemaNode::string().describe("Message type").with_default("text"),
            )
            .property(
                "content",
                SchemaNode::string().describe("JSON-encoded message content"),
            )
            .require(&["receive_id", "content"]),
    ))?;

    catalog.register_proxy(ToolDescriptor::new(
        "bitable.v1.appTableRecord.search",
        "Search Bitable records through the upstream Lark MCP server",
        SchemaNode::object()
            .property("app_token", app_token())
            .property("table_id", table_id())
            .property("filter", SchemaNode::string().describe("Filter formula"))
            .property("page_size", page_size("records"))
            .require(&["app_token", "table_id"]),
    ))?;

    catalog.register_proxy(ToolDescriptor::new(
        "bitable.v1.appTableRecord.create",
        "Create a Bitable record through the upstream Lark MCP server",
        SchemaNode::object()
            .property("app_token", app_token())
            .property("table_id", table_id())
            .property("fields", SchemaNode::object().describe("Record field data"))
            .require(&["app_token", "table_id", "fields"]),
    ))?;

    Ok(catalog)
}

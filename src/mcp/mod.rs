pub mod bridge;
pub mod resources;
pub mod types;

pub use bridge::{BridgeReply, Inbound, IntegrationStatus, McpBridge, ReplyBody};
pub use types::{codes, RpcError, RpcMethod, RpcRequest, RpcResponse};

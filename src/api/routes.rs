use crate::api::handlers::{self, ApiState};
use axum::{
    Router,
    routing::{get, post},
};

pub fn health_routes() -> Router<ApiState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/info", get(handlers::server_info))
}

pub fn mcp_routes() -> Router<ApiState> {
    Router::new()
        .route("/mcp/invoke", post(handlers::mcp_invoke))
        .route("/mcp/proxy", post(handlers::mcp_proxy))
        .route("/mcp/tools", get(handlers::mcp_list_tools))
        .route("/mcp/resources", get(handlers::mcp_list_resources))
        .route("/mcp/prompts", get(handlers::mcp_list_prompts))
}

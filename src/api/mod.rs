pub mod handlers;
pub mod routes;

use crate::config::AppConfig;
use crate::security;
use anyhow::Result;
use axum::{Router, middleware};
use handlers::ApiState;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub async fn start_server(config: AppConfig) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);

    let state = ApiState::from_config(&config)?;
    let purge = state.gate().spawn_purge_task();

    let tools = state.bridge.catalog().registry().names();
    let app = build_router(state, &config.security.cors_origins);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("HTTP server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("Server info: http://{}/info", addr);
    info!("JSON-RPC endpoint: http://{}/mcp/invoke", addr);
    info!("");
    info!("Registered tools:");
    for name in tools {
        info!("  → {}", name);
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    purge.abort();
    Ok(())
}

/// Assemble the HTTP surface with security headers, CORS and request tracing
pub fn build_router(state: ApiState, cors_origins: &[String]) -> Router {
    let gate = state.gate().clone();
    let cors = security::build_cors_layer(cors_origins, gate.security_enabled());

    Router::new()
        .merge(routes::health_routes())
        .merge(routes::mcp_routes())
        .layer(middleware::from_fn_with_state(
            gate,
            security::security_headers,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM signal, shutting down...");
        },
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use lark_mcp_bridge::{api, config};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "lark-mcp-bridge")]
#[command(about = "JSON-RPC tool bridge for Lark and Telegram", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Override log format (pretty, json)
    #[arg(long)]
    log_format: Option<String>,

    /// Override the listening port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = config::load_config(&cli.config).with_context(|| {
        format!(
            "Failed to load configuration from: {}",
            cli.config.display()
        )
    })?;

    if let Some(log_level) = cli.log_level {
        config.logging.level = log_level;
    }
    if let Some(log_format) = cli.log_format {
        config.logging.format = log_format;
    }
    if let Some(port) = cli.port {
        config.http.port = port;
    }
    config::validate_config(&config)?;

    init_logging(&config.logging)?;

    print_banner(&config);

    info!("Starting lark-mcp-bridge...");
    api::start_server(config).await?;

    Ok(())
}

fn init_logging(config: &config::LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .try_init()?;
        }
    }

    Ok(())
}

fn print_banner(config: &config::AppConfig) {
    let version = env!("CARGO_PKG_VERSION");
    let width = 59usize;
    let border = "═".repeat(width + 2);
    let line = |content: &str| {
        info!("║ {:width$} ║", content, width = width);
    };
    let enabled = |on: bool| if on { "enabled" } else { "disabled" };

    info!("╔{}╗", border);
    line("LARK-MCP-BRIDGE");
    line(&format!("JSON-RPC Tool Bridge v{}", version));
    info!("╚{}╝", border);
    info!("");
    info!("Server Configuration:");
    info!("  → Address: {}:{}", config.http.host, config.http.port);
    info!("  → Log Level: {}", config.logging.level);
    info!("  → Log Format: {}", config.logging.format);
    info!("  → API Keys: {}", enabled(config.security.has_keys()));
    info!(
        "  → Rate Limit: {} requests/minute",
        if config.security.has_keys() {
            config.rate_limit.authenticated_per_minute
        } else {
            config.rate_limit.anonymous_per_minute
        }
    );
    info!(
        "  → Proxy: {}",
        config
            .proxy
            .target_url
            .as_deref()
            .filter(|_| config.proxy.enabled)
            .unwrap_or("disabled")
    );
    info!(
        "  → Lark: {}",
        enabled(config.lark.tenant_access_token.is_some() || config.lark.app_id.is_some())
    );
    info!("  → Telegram: {}", enabled(config.telegram.token.is_some()));
    info!("");
}

pub mod types;

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use std::collections::HashMap;
use std::path::Path;
pub use types::*;

/// Prefix for structured overrides, e.g. `BRIDGE__RATE_LIMIT__ANONYMOUS_PER_MINUTE`
pub const ENV_PREFIX: &str = "BRIDGE";

/// Load configuration from an optional TOML file and the process environment
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    load_config_from(path, std::env::vars().collect())
}

/// Layering, lowest first: defaults, the TOML file (if present),
/// `BRIDGE__SECTION__KEY` variables, then the flat deployment variables.
pub fn load_config_from<P: AsRef<Path>>(path: P, env: HashMap<String, String>) -> Result<AppConfig> {
    let path = path.as_ref();

    let builder = Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("security.cors_origins")
                .source(Some(env.clone())),
        );

    let config = apply_deployment_env(builder, &env)?
        .build()
        .with_context(|| format!("Failed to load config from: {}", path.display()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Flat variables used by existing deployments (`API_KEY_ADMIN`, `PORT`, ...)
fn apply_deployment_env(
    builder: ConfigBuilder<DefaultState>,
    env: &HashMap<String, String>,
) -> Result<ConfigBuilder<DefaultState>> {
    let var = |key: &str| {
        env.get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let builder = builder
        .set_override_option("security.admin_key", var("API_KEY_ADMIN"))?
        .set_override_option("security.user_key", var("API_KEY_USER"))?
        .set_override_option(
            "security.cors_origins",
            var("CORS_ORIGINS").map(|v| split_list(&v)),
        )?
        .set_override_option(
            "proxy.enabled",
            var("MCP_PROXY_ENABLED").map(|v| parse_flag(&v)),
        )?
        .set_override_option(
            "proxy.target_url",
            var("MCP_PROXY_URL").or_else(|| var("MCP_BRIDGE_INTERNAL_BASE")),
        )?
        .set_override_option("lark.app_id", var("LARK_APP_ID"))?
        .set_override_option("lark.app_secret", var("LARK_APP_SECRET"))?
        .set_override_option("lark.tenant_access_token", var("LARK_TENANT_ACCESS_TOKEN"))?
        .set_override_option("telegram.token", var("TELEGRAM_TOKEN"))?;

    let port = match var("PORT") {
        Some(raw) => Some(
            raw.parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got '{}'", raw))?
                as u64,
        ),
        None => None,
    };

    Ok(builder.set_override_option("http.port", port)?)
}

/// Validate the loaded configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        anyhow::bail!(
            "Invalid log level '{}'. Valid levels: {}",
            config.logging.level,
            valid_levels.join(", ")
        );
    }

    // Validate log format
    let valid_formats = ["pretty", "json"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        anyhow::bail!(
            "Invalid log format '{}'. Valid formats: {}",
            config.logging.format,
            valid_formats.join(", ")
        );
    }

    if config.rate_limit.anonymous_per_minute == 0
        || config.rate_limit.authenticated_per_minute == 0
    {
        anyhow::bail!("Rate limits must be greater than zero");
    }

    if config.security.max_content_length == 0 {
        anyhow::bail!("security.max_content_length must be greater than zero");
    }

    if let (Some(admin), Some(user)) = (&config.security.admin_key, &config.security.user_key) {
        if !admin.is_empty() && admin == user {
            anyhow::bail!("Admin and user API keys must differ");
        }
    }

    if config.proxy.timeout_secs == 0 {
        anyhow::bail!("proxy.timeout_secs must be greater than zero");
    }

    if let Some(url) = &config.proxy.target_url {
        let parsed = reqwest::Url::parse(url)
            .with_context(|| format!("Invalid proxy target URL '{}'", url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("Proxy target URL must use http or https, got '{}'", url);
        }
    }

    if config.proxy.enabled && config.proxy.target_url.is_none() {
        tracing::warn!("Proxy is enabled but no target URL is configured; proxy tools will report it as disabled");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config(
            r#"
[http]
host = "127.0.0.1"
port = 9000

[logging]
level = "debug"
format = "json"

[rate_limit]
anonymous_per_minute = 100

[proxy]
enabled = true
target_url = "http://127.0.0.1:7000/mcp"
timeout_secs = 3
"#,
        );

        let config = load_config_from(file.path(), HashMap::new()).unwrap();
        assert_eq!(config.http.host, "127.0.0.1");
        assert_eq!(config.http.port, 9000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.rate_limit.anonymous_per_minute, 100);
        assert_eq!(config.rate_limit.authenticated_per_minute, 20);
        assert!(config.proxy.enabled);
        assert_eq!(config.proxy.timeout_secs, 3);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config_from("does-not-exist.toml", HashMap::new()).unwrap();
        assert_eq!(config.http.port, 8000);
        assert_eq!(config.logging.level, "info");
        assert!(!config.proxy.enabled);
    }

    #[test]
    fn test_structured_env_overrides_file() {
        let file = write_config("[rate_limit]\nanonymous_per_minute = 100\n");
        let config = load_config_from(
            file.path(),
            env(&[
                ("BRIDGE__RATE_LIMIT__ANONYMOUS_PER_MINUTE", "7"),
                ("BRIDGE__SECURITY__CORS_ORIGINS", "https://a.example,https://b.example"),
            ]),
        )
        .unwrap();
        assert_eq!(config.rate_limit.anonymous_per_minute, 7);
        assert_eq!(
            config.security.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_deployment_variables() {
        let config = load_config_from(
            "does-not-exist.toml",
            env(&[
                ("API_KEY_ADMIN", "adm"),
                ("API_KEY_USER", "usr"),
                ("CORS_ORIGINS", "https://app.example, https://ops.example"),
                ("MCP_PROXY_ENABLED", "TRUE"),
                ("MCP_BRIDGE_INTERNAL_BASE", "http://localhost:5000/mcp"),
                ("LARK_APP_ID", "cli_1"),
                ("TELEGRAM_TOKEN", "123:abc"),
                ("PORT", "10000"),
            ]),
        )
        .unwrap();

        assert_eq!(config.security.admin_key.as_deref(), Some("adm"));
        assert_eq!(config.security.user_key.as_deref(), Some("usr"));
        assert_eq!(
            config.security.cors_origins,
            vec!["https://app.example", "https://ops.example"]
        );
        assert!(config.proxy.enabled);
        assert_eq!(
            config.proxy.target_url.as_deref(),
            Some("http://localhost:5000/mcp")
        );
        assert_eq!(config.lark.app_id.as_deref(), Some("cli_1"));
        assert_eq!(config.telegram.token.as_deref(), Some("123:abc"));
        assert_eq!(config.http.port, 10000);
    }

    #[test]
    fn test_proxy_url_takes_precedence_over_internal_base() {
        let config = load_config_from(
            "does-not-exist.toml",
            env(&[
                ("MCP_PROXY_URL", "http://primary:1/mcp"),
                ("MCP_BRIDGE_INTERNAL_BASE", "http://fallback:2/mcp"),
            ]),
        )
        .unwrap();
        assert_eq!(config.proxy.target_url.as_deref(), Some("http://primary:1/mcp"));
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(load_config_from("does-not-exist.toml", env(&[("PORT", "eighty")])).is_err());
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_rate_limit() {
        let mut config = AppConfig::default();
        config.rate_limit.authenticated_per_minute = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_key_collision() {
        let mut config = AppConfig::default();
        config.security.admin_key = Some("same".to_string());
        config.security.user_key = Some("same".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_proxy_url() {
        let mut config = AppConfig::default();
        config.proxy.target_url = Some("not a url".to_string());
        assert!(validate_config(&config).is_err());

        config.proxy.target_url = Some("ftp://upstream/mcp".to_string());
        assert!(validate_config(&config).is_err());

        config.proxy.target_url = Some("https://upstream.example/mcp".to_string());
        assert!(validate_config(&config).is_ok());
    }
}

use crate::security::sanitize::DEFAULT_MAX_CONTENT_LENGTH;
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub lark: LarkConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub admin_key: Option<String>,
    pub user_key: Option<String>,
    pub cors_origins: Vec<String>,
    pub max_content_length: usize,
}

impl SecurityConfig {
    pub fn has_keys(&self) -> bool {
        [&self.admin_key, &self.user_key]
            .iter()
            .any(|k| k.as_deref().map(|k| !k.trim().is_empty()).unwrap_or(false))
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            admin_key: None,
            user_key: None,
            cors_origins: vec!["*".to_string()],
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
        }
    }
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("admin_key", &self.admin_key.as_ref().map(|_| "[REDACTED]"))
            .field("user_key", &self.user_key.as_ref().map(|_| "[REDACTED]"))
            .field("cors_origins", &self.cors_origins)
            .field("max_content_length", &self.max_content_length)
            .finish()
    }
}

/// Requests per minute for the two security profiles
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Used when no API key is configured
    pub anonymous_per_minute: u32,
    /// Used when at least one API key is configured
    pub authenticated_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            anonymous_per_minute: 50,
            authenticated_per_minute: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub target_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target_url: None,
            timeout_secs: 5,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct LarkConfig {
    pub base_url: String,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub tenant_access_token: Option<String>,
}

impl Default for LarkConfig {
    fn default() -> Self {
        Self {
            base_url: "https://open.larksuite.com/open-apis".to_string(),
            app_id: None,
            app_secret: None,
            tenant_access_token: None,
        }
    }
}

impl fmt::Debug for LarkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LarkConfig")
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[REDACTED]"))
            .field(
                "tenant_access_token",
                &self.tenant_access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub base_url: String,
    pub token: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.telegram.org".to_string(),
            token: None,
        }
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.http.port, 8000);
        assert_eq!(config.rate_limit.anonymous_per_minute, 50);
        assert_eq!(config.rate_limit.authenticated_per_minute, 20);
        assert_eq!(config.proxy.timeout_secs, 5);
        assert_eq!(config.security.max_content_length, 4000);
        assert_eq!(config.security.cors_origins, vec!["*"]);
        assert!(!config.security.has_keys());
    }

    #[test]
    fn test_blank_keys_do_not_count() {
        let security = SecurityConfig {
            admin_key: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(!security.has_keys());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AppConfig {
            security: SecurityConfig {
                admin_key: Some("adm-123".to_string()),
                ..Default::default()
            },
            lark: LarkConfig {
                app_secret: Some("lark-secret".to_string()),
                ..Default::default()
            },
            telegram: TelegramConfig {
                token: Some("123:tg".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("adm-123"));
        assert!(!rendered.contains("lark-secret"));
        assert!(!rendered.contains("123:tg"));
    }
}

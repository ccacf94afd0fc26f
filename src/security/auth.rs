use crate::error::{BridgeError, Result};
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;
use subtle::ConstantTimeEq;

/// Privilege granted to a request after key matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthLevel {
    Anonymous,
    User,
    Admin,
}

impl AuthLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthLevel::Anonymous => "anonymous",
            AuthLevel::User => "user",
            AuthLevel::Admin => "admin",
        }
    }
}

impl fmt::Display for AuthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an operation may run without a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequirement {
    Open,
    Required,
}

/// Outcome of comparing the presented bearer token against the configured keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMatch {
    Missing,
    Invalid,
    Matched(AuthLevel),
}

impl KeyMatch {
    /// Level used for identity and quota accounting
    pub fn effective_level(&self) -> AuthLevel {
        match self {
            KeyMatch::Matched(level) => *level,
            KeyMatch::Missing | KeyMatch::Invalid => AuthLevel::Anonymous,
        }
    }
}

/// Admin and user API keys. Security is enabled when at least one is set.
#[derive(Clone, Default)]
pub struct ApiKeys {
    admin: Option<String>,
    user: Option<String>,
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeys")
            .field("admin", &self.admin.as_ref().map(|_| "[REDACTED]"))
            .field("user", &self.user.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn non_empty(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

fn keys_equal(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    provided.len() == expected.len() && provided.ct_eq(expected).into()
}

impl ApiKeys {
    pub fn new(admin: Option<String>, user: Option<String>) -> Self {
        Self {
            admin: non_empty(admin),
            user: non_empty(user),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.admin.is_some() || self.user.is_some()
    }

    /// Compare against both keys so timing does not reveal which one matched
    pub fn classify(&self, bearer: Option<&str>) -> KeyMatch {
        let Some(token) = bearer.map(str::trim).filter(|t| !t.is_empty()) else {
            return KeyMatch::Missing;
        };

        let admin = self
            .admin
            .as_deref()
            .map(|k| keys_equal(token, k))
            .unwrap_or(false);
        let user = self
            .user
            .as_deref()
            .map(|k| keys_equal(token, k))
            .unwrap_or(false);

        if admin {
            KeyMatch::Matched(AuthLevel::Admin)
        } else if user {
            KeyMatch::Matched(AuthLevel::User)
        } else {
            KeyMatch::Invalid
        }
    }

    /// Resolve the caller's level, rejecting only where a key is mandatory
    pub fn authorize(&self, key: KeyMatch, requirement: AuthRequirement) -> Result<AuthLevel> {
        if !self.is_enabled() {
            return Ok(AuthLevel::Anonymous);
        }

        match (key, requirement) {
            (KeyMatch::Matched(level), _) => Ok(level),
            (_, AuthRequirement::Open) => Ok(AuthLevel::Anonymous),
            (KeyMatch::Missing, AuthRequirement::Required) => Err(BridgeError::unauthenticated()),
            (KeyMatch::Invalid, AuthRequirement::Required) => Err(BridgeError::invalid_key()),
        }
    }
}

/// Rate-limit bucket key: privilege level plus peer IP.
///
/// The port is left out since clients reconnect from fresh ephemeral ports.
pub fn client_identity(level: AuthLevel, peer: Option<SocketAddr>) -> String {
    match peer {
        Some(addr) => format!("{}@{}", level, addr.ip()),
        None => format!("{}@unknown", level),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> ApiKeys {
        ApiKeys::new(Some("admin-secret".to_string()), Some("user-secret".to_string()))
    }

    #[test]
    fn test_classify_keys() {
        let keys = keys();
        assert_eq!(keys.classify(None), KeyMatch::Missing);
        assert_eq!(keys.classify(Some("  ")), KeyMatch::Missing);
        assert_eq!(keys.classify(Some("nope")), KeyMatch::Invalid);
        assert_eq!(
            keys.classify(Some("admin-secret")),
            KeyMatch::Matched(AuthLevel::Admin)
        );
        assert_eq!(
            keys.classify(Some("user-secret")),
            KeyMatch::Matched(AuthLevel::User)
        );
    }

    #[test]
    fn test_prefix_of_key_does_not_match() {
        assert_eq!(keys().classify(Some("admin-secre")), KeyMatch::Invalid);
    }

    #[test]
    fn test_empty_keys_disable_security() {
        let keys = ApiKeys::new(Some("".to_string()), None);
        assert!(!keys.is_enabled());
        assert_eq!(
            keys.authorize(KeyMatch::Missing, AuthRequirement::Required)
                .unwrap(),
            AuthLevel::Anonymous
        );
    }

    #[test]
    fn test_required_operations_reject_missing_and_invalid() {
        let keys = keys();
        let missing = keys
            .authorize(KeyMatch::Missing, AuthRequirement::Required)
            .unwrap_err();
        assert_eq!(missing.detail(), "API key required when security is enabled");

        let invalid = keys
            .authorize(KeyMatch::Invalid, AuthRequirement::Required)
            .unwrap_err();
        assert_eq!(invalid.detail(), "Invalid API key");
    }

    #[test]
    fn test_open_operations_downgrade_to_anonymous() {
        let keys = keys();
        assert_eq!(
            keys.authorize(KeyMatch::Invalid, AuthRequirement::Open)
                .unwrap(),
            AuthLevel::Anonymous
        );
        assert_eq!(
            keys.authorize(KeyMatch::Matched(AuthLevel::User), AuthRequirement::Open)
                .unwrap(),
            AuthLevel::User
        );
    }

    #[test]
    fn test_identity_ignores_port() {
        let a: SocketAddr = "10.0.0.7:50001".parse().unwrap();
        let b: SocketAddr = "10.0.0.7:50002".parse().unwrap();
        assert_eq!(
            client_identity(AuthLevel::User, Some(a)),
            client_identity(AuthLevel::User, Some(b))
        );
        assert_eq!(client_identity(AuthLevel::Anonymous, None), "anonymous@unknown");
    }

    #[test]
    fn test_debug_redacts_keys() {
        let rendered = format!("{:?}", keys());
        assert!(!rendered.contains("admin-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}

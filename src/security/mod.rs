pub mod auth;
pub mod rate_limit;
pub mod sanitize;

pub use auth::{client_identity, ApiKeys, AuthLevel, AuthRequirement, KeyMatch};
pub use rate_limit::{RateDecision, RateLimitInfo, RateLimiter};
pub use sanitize::ContentPolicy;

use crate::config::AppConfig;
use crate::error::{BridgeError, Result};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, warn};

/// A request that passed authentication and rate limiting
#[derive(Debug, Clone)]
pub struct Admission {
    pub level: AuthLevel,
    pub identity: String,
    pub quota: RateLimitInfo,
}

/// Process-wide authentication, rate limiting and content policy.
///
/// Built once at startup; the limiter's windows are the only mutable state.
#[derive(Debug)]
pub struct SecurityGate {
    keys: ApiKeys,
    limiter: RateLimiter,
    content: ContentPolicy,
}

impl SecurityGate {
    pub fn new(keys: ApiKeys, limiter: RateLimiter, content: ContentPolicy) -> Self {
        Self {
            keys,
            limiter,
            content,
        }
    }

    /// Pick the threshold profile from whether any key is configured
    pub fn from_config(config: &AppConfig) -> Self {
        let keys = ApiKeys::new(
            config.security.admin_key.clone(),
            config.security.user_key.clone(),
        );
        let limit = if keys.is_enabled() {
            config.rate_limit.authenticated_per_minute
        } else {
            config.rate_limit.anonymous_per_minute
        };

        Self::new(
            keys,
            RateLimiter::per_minute(limit),
            ContentPolicy::new(config.security.max_content_length),
        )
    }

    pub fn security_enabled(&self) -> bool {
        self.keys.is_enabled()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Authenticate and count the request.
    ///
    /// The quota is charged before an auth rejection, so failed key guesses
    /// spend the anonymous budget of the caller's address.
    pub fn admit(
        &self,
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        requirement: AuthRequirement,
    ) -> Result<Admission> {
        let bearer = headers.typed_get::<Authorization<Bearer>>();
        let key = self.keys.classify(bearer.as_ref().map(|auth| auth.token()));
        let identity = client_identity(key.effective_level(), peer);

        let quota = match self.limiter.admit(&identity) {
            RateDecision::Allowed(info) => info,
            RateDecision::Denied(info) => {
                warn!(
                    identity = %identity,
                    limit = info.limit,
                    retry_after = info.retry_after_secs(),
                    "Rate limit exceeded"
                );
                return Err(BridgeError::RateLimited(info));
            }
        };

        let level = self.keys.authorize(key, requirement).map_err(|err| {
            warn!(identity = %identity, error = %err, "Authentication failed");
            err.with_quota(quota.clone())
        })?;

        debug!(identity = %identity, level = %level, remaining = quota.remaining, "Request admitted");

        Ok(Admission {
            level,
            identity,
            quota,
        })
    }

    /// Admin-only tools need the admin key, but only when keys are configured
    pub fn require_admin(&self, admission: &Admission, tool: &str) -> Result<()> {
        if self.keys.is_enabled() && admission.level != AuthLevel::Admin {
            warn!(identity = %admission.identity, tool, "Admin-only tool refused");
            return Err(BridgeError::Forbidden(format!(
                "Tool '{}' requires an admin API key",
                tool
            ))
            .with_quota(admission.quota.clone()));
        }
        Ok(())
    }

    pub fn sanitize(&self, arguments: &Value) -> Result<()> {
        self.content.check_arguments(arguments)
    }

    pub fn security_headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        let mut headers = vec![
            (
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ),
            (
                header::X_XSS_PROTECTION,
                HeaderValue::from_static("1; mode=block"),
            ),
        ];

        if self.keys.is_enabled() {
            headers.push((header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")));
            headers.push((
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static("max-age=31536000; includeSubDomains"),
            ));
        } else {
            headers.push((
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("SAMEORIGIN"),
            ));
        }

        headers
    }

    /// Periodically drop stale rate windows until the runtime shuts down
    pub fn spawn_purge_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let gate = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(gate.limiter.window());
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = gate.limiter.purge_expired();
                if removed > 0 {
                    debug!(removed, "Purged expired rate-limit windows");
                }
            }
        })
    }
}

pub async fn security_headers(
    State(gate): State<Arc<SecurityGate>>,
    req: Request,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    for (name, value) in gate.security_headers() {
        headers.insert(name, value);
    }
    response
}

pub fn build_cors_layer(origins: &[String], has_auth: bool) -> CorsLayer {
    let max_age = Duration::from_secs(600);

    if origins.is_empty() {
        CorsLayer::new()
    } else if origins.iter().any(|o| o == "*") {
        if has_auth {
            warn!("Wildcard CORS origin configured while API keys are enabled");
        }
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .max_age(max_age)
    } else {
        let mut valid = Vec::with_capacity(origins.len());
        for origin in origins {
            match origin.parse::<HeaderValue>() {
                Ok(value) => valid.push(value),
                Err(e) => warn!(origin, error = %e, "Ignoring unparsable CORS origin"),
            }
        }

        CorsLayer::new()
            .allow_origin(valid)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .max_age(max_age)
    }
}

use axum::http::{HeaderMap, StatusCode};
use thiserror::Error;

use crate::security::rate_limit::RateLimitInfo;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded: retry after {}s", .0.retry_after_secs())]
    RateLimited(RateLimitInfo),

    #[error("Invalid content: {0}")]
    InvalidContent(String),

    #[error("Tool handler fault: {0}")]
    HandlerFault(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    /// A rejection raised after the request was charged against its quota
    #[error("{source}")]
    Metered {
        source: Box<BridgeError>,
        quota: RateLimitInfo,
    },
}

pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            BridgeError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BridgeError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            BridgeError::Forbidden(_) => StatusCode::FORBIDDEN,
            BridgeError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            BridgeError::InvalidContent(_) => StatusCode::BAD_REQUEST,
            BridgeError::HandlerFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BridgeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BridgeError::Json(_) => StatusCode::BAD_REQUEST,
            BridgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BridgeError::Metered { source, .. } => source.status_code(),
        }
    }

    /// Caller-facing description. Server faults get a generic message so
    /// internal detail never reaches the response body.
    pub fn detail(&self) -> String {
        match self {
            BridgeError::Unauthorized(msg)
            | BridgeError::Forbidden(msg)
            | BridgeError::InvalidContent(msg) => msg.clone(),
            BridgeError::RateLimited(info) => format!(
                "Rate limit exceeded: {} requests per minute. Retry after {} seconds",
                info.limit,
                info.retry_after_secs()
            ),
            BridgeError::Json(err) => format!("Malformed JSON: {err}"),
            BridgeError::Config(_)
            | BridgeError::HandlerFault(_)
            | BridgeError::Io(_)
            | BridgeError::Internal(_) => "Internal server error".to_string(),
            BridgeError::Metered { source, .. } => source.detail(),
        }
    }

    /// Attach the quota snapshot of an admitted request
    pub fn with_quota(self, quota: RateLimitInfo) -> Self {
        match self {
            BridgeError::RateLimited(_) | BridgeError::Metered { .. } => self,
            other => BridgeError::Metered {
                source: Box::new(other),
                quota,
            },
        }
    }

    /// The underlying error, without quota metadata
    pub fn root(&self) -> &BridgeError {
        match self {
            BridgeError::Metered { source, .. } => source.root(),
            other => other,
        }
    }

    fn quota(&self) -> Option<&RateLimitInfo> {
        match self {
            BridgeError::RateLimited(info) | BridgeError::Metered { quota: info, .. } => {
                Some(info)
            }
            _ => None,
        }
    }

    pub fn unauthenticated() -> Self {
        BridgeError::Unauthorized("API key required when security is enabled".to_string())
    }

    pub fn invalid_key() -> Self {
        BridgeError::Unauthorized("Invalid API key".to_string())
    }
}

impl From<anyhow::Error> for BridgeError {
    fn from(err: anyhow::Error) -> Self {
        BridgeError::Internal(err.to_string())
    }
}

impl axum::response::IntoResponse for BridgeError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed with server error");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let mut headers = HeaderMap::new();
        if let Some(info) = self.quota() {
            info.write_headers(&mut headers);
        }

        let body = serde_json::json!({
            "detail": self.detail(),
            "status_code": status.as_u16(),
        });

        (status, headers, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            BridgeError::Config("test".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            BridgeError::unauthenticated().status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            BridgeError::Forbidden("test".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            BridgeError::InvalidContent("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BridgeError::HandlerFault("test".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_display() {
        let err = BridgeError::InvalidContent("Content contains forbidden patterns".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid content: Content contains forbidden patterns"
        );
    }

    #[test]
    fn test_server_errors_hide_internal_detail() {
        let err = BridgeError::Internal("db password=hunter2".to_string());
        assert_eq!(err.detail(), "Internal server error");
    }

    #[test]
    fn test_error_from_anyhow() {
        let anyhow_err = anyhow::anyhow!("something went wrong");
        let err: BridgeError = anyhow_err.into();
        assert!(matches!(err, BridgeError::Internal(_)));
        assert!(err.to_string().contains("something went wrong"));
    }

    #[tokio::test]
    async fn test_error_into_response_body_shape() {
        use axum::response::IntoResponse;

        let response = BridgeError::invalid_key().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "Invalid API key");
        assert_eq!(json["status_code"], 401);
    }

    #[test]
    fn test_metered_rejection_keeps_status_and_headers() {
        use axum::response::IntoResponse;

        let info = RateLimitInfo {
            limit: 20,
            remaining: 17,
            reset_at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_060),
            retry_after: None,
        };
        let err = BridgeError::Forbidden("admin only".to_string()).with_quota(info);
        assert!(matches!(err.root(), BridgeError::Forbidden(_)));
        assert_eq!(err.to_string(), "Forbidden: admin only");
        assert_eq!(err.detail(), "admin only");

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let headers = response.headers();
        assert_eq!(headers["x-ratelimit-limit"], "20");
        assert_eq!(headers["x-ratelimit-remaining"], "17");
        assert!(headers.get("retry-after").is_none());
    }

    #[test]
    fn test_rate_limited_response_carries_headers() {
        use axum::response::IntoResponse;

        let info = RateLimitInfo {
            limit: 20,
            remaining: 0,
            reset_at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_060),
            retry_after: Some(Duration::from_secs(12)),
        };
        let response = BridgeError::RateLimited(info).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers["x-ratelimit-limit"], "20");
        assert_eq!(headers["x-ratelimit-remaining"], "0");
        assert_eq!(headers["x-ratelimit-reset"], "1700000060");
        assert_eq!(headers["retry-after"], "12");
    }
}

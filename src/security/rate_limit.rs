use axum::http::{HeaderMap, HeaderName, HeaderValue};
use dashmap::DashMap;
use std::fmt;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

const HEADER_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const HEADER_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const HEADER_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
const HEADER_RETRY_AFTER: HeaderName = HeaderName::from_static("retry-after");

/// Quota snapshot returned with every admission decision
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: SystemTime,
    /// Only set on denial
    pub retry_after: Option<Duration>,
}

impl RateLimitInfo {
    /// Whole seconds until retry is worthwhile, rounded up and never zero
    pub fn retry_after_secs(&self) -> u64 {
        match self.retry_after {
            Some(wait) => {
                let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                secs.max(1)
            }
            None => 0,
        }
    }

    pub fn reset_epoch_secs(&self) -> u64 {
        self.reset_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }

    pub fn write_headers(&self, headers: &mut HeaderMap) {
        headers.insert(HEADER_LIMIT, HeaderValue::from(self.limit));
        headers.insert(HEADER_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(HEADER_RESET, HeaderValue::from(self.reset_epoch_secs()));
        if self.retry_after.is_some() {
            headers.insert(HEADER_RETRY_AFTER, HeaderValue::from(self.retry_after_secs()));
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RateDecision {
    Allowed(RateLimitInfo),
    Denied(RateLimitInfo),
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed(_))
    }

    pub fn info(&self) -> &RateLimitInfo {
        match self {
            RateDecision::Allowed(info) | RateDecision::Denied(info) => info,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    window_start: Instant,
}

/// Fixed-window request counter keyed by client identity.
///
/// Every check consumes a slot, including the ones that end up denied, and
/// slots are never handed back.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<String, RateWindow>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit())
            .field("window", &self.window())
            .field("tracked", &self.tracked_identities())
            .finish()
    }
}

impl RateLimiter {
    pub fn per_minute(limit: u32) -> Self {
        Self::with_window(limit, RATE_LIMIT_WINDOW)
    }

    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: DashMap::new(),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn admit(&self, identity: &str) -> RateDecision {
        self.admit_at(identity, Instant::now(), SystemTime::now())
    }

    pub(crate) fn admit_at(&self, identity: &str, now: Instant, wall_now: SystemTime) -> RateDecision {
        // The entry guard holds the shard lock, so increment-and-compare is atomic per identity.
        let mut entry = self
            .windows
            .entry(identity.to_string())
            .or_insert(RateWindow {
                count: 0,
                window_start: now,
            });

        if now.saturating_duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count = entry.count.saturating_add(1);

        let until_reset = self
            .window
            .saturating_sub(now.saturating_duration_since(entry.window_start));
        let mut info = RateLimitInfo {
            limit: self.limit,
            remaining: self.limit.saturating_sub(entry.count),
            reset_at: wall_now + until_reset,
            retry_after: None,
        };

        if entry.count > self.limit {
            info.retry_after = Some(until_reset);
            RateDecision::Denied(info)
        } else {
            RateDecision::Allowed(info)
        }
    }

    /// Drop windows that ended more than one full window ago
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub(crate) fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        let horizon = self.window * 2;
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.window_start) < horizon);
        before - self.windows.len()
    }

    pub fn tracked_identities(&self) -> usize {
        self.windows.len()
    }
}

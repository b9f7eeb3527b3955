//! Rate limiter types: tiers, windows and decisions

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use catalog_common::config::QuotaConfig;
use serde::{Deserialize, Serialize};

/// Hourly and burst maxima of one tier
pub type QuotaTier = QuotaConfig;

/// Expired records stay readable for this long past their window
pub const EXPIRY_GRACE_SECS: i64 = 60;

pub const HEADER_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const HEADER_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const HEADER_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
pub const HEADER_RETRY_AFTER: HeaderName = HeaderName::from_static("retry-after");

/// Named quota profile selectable per route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Default,
    Api,
    Strict,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Default, Tier::Api, Tier::Strict];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Default => "default",
            Tier::Api => "api",
            Tier::Strict => "strict",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Hourly,
    Burst,
}

impl WindowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::Hourly => "hourly",
            WindowKind::Burst => "burst",
        }
    }

    /// Window length in seconds
    pub fn length_secs(&self) -> i64 {
        match self {
            WindowKind::Hourly => 3600,
            WindowKind::Burst => 60,
        }
    }

    /// Maximum requests this window allows for `quota`
    pub fn max_for(&self, quota: &QuotaTier) -> u32 {
        match self {
            WindowKind::Hourly => quota.per_hour,
            WindowKind::Burst => quota.burst,
        }
    }
}

/// Store key for one (fingerprint, tier, window) bucket
pub fn window_key(fingerprint: &str, tier: Tier, kind: WindowKind) -> String {
    format!("rate_limit:{}:{}:{}", fingerprint, tier, kind.as_str())
}

/// Persisted request timestamps of one window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRecord {
    pub fingerprint: String,
    pub kind: WindowKind,
    /// Epoch seconds, oldest first
    pub timestamps: Vec<i64>,
    /// Epoch second after which the record is treated as absent
    pub expires_at: i64,
}

/// Result of evaluating one window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOutcome {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: i64,
    pub retry_after: i64,
}

impl WindowRecord {
    pub fn empty(fingerprint: impl Into<String>, kind: WindowKind) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            kind,
            timestamps: Vec::new(),
            expires_at: 0,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at < now
    }

    /// Drop timestamps that fell out of the window
    pub fn prune(&mut self, now: i64) {
        let window_start = now - self.kind.length_secs();
        self.timestamps.retain(|&t| t > window_start);
    }

    fn oldest(&self) -> Option<i64> {
        self.timestamps.iter().copied().min()
    }

    /// Prune, then decide whether one more request fits under `max`.
    ///
    /// When `consume` is set and the request fits, `now` is appended and
    /// the expiry pushed out to `now + window + grace`. Without `consume`
    /// the record is only pruned and `remaining` reflects the current count.
    pub fn evaluate(&mut self, max: u32, now: i64, consume: bool) -> WindowOutcome {
        self.prune(now);
        let length = self.kind.length_secs();
        let count = self.timestamps.len() as u32;

        if count >= max {
            let reset_at = self.oldest().unwrap_or(now) + length;
            return WindowOutcome {
                allowed: false,
                remaining: 0,
                reset_at,
                retry_after: reset_at - now,
            };
        }

        if consume {
            self.timestamps.push(now);
            self.expires_at = now + length + EXPIRY_GRACE_SECS;
        }

        let count = self.timestamps.len() as u32;
        WindowOutcome {
            allowed: true,
            remaining: max.saturating_sub(count),
            reset_at: self.oldest().unwrap_or(now) + length,
            retry_after: 0,
        }
    }
}

/// Combined verdict of both windows for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Hourly maximum of the tier; `None` for whitelisted clients
    pub limit: Option<u32>,
    /// `None` for whitelisted clients
    pub remaining: Option<u32>,
    pub reset_at: i64,
    pub retry_after: i64,
}

impl RateLimitDecision {
    /// Whitelisted clients are never counted
    pub fn unlimited() -> Self {
        Self {
            allowed: true,
            limit: None,
            remaining: None,
            reset_at: 0,
            retry_after: 0,
        }
    }

    /// Allowed only if both windows allow
    pub fn combine(limit: u32, hourly: WindowOutcome, burst: WindowOutcome) -> Self {
        let remaining = hourly.remaining.min(burst.remaining);

        if hourly.allowed && burst.allowed {
            Self {
                allowed: true,
                limit: Some(limit),
                remaining: Some(remaining),
                reset_at: hourly.reset_at,
                retry_after: 0,
            }
        } else {
            Self {
                allowed: false,
                limit: Some(limit),
                remaining: Some(remaining),
                reset_at: hourly.reset_at.max(burst.reset_at),
                retry_after: hourly.retry_after.max(burst.retry_after),
            }
        }
    }

    /// `X-RateLimit-*` headers, plus `Retry-After` when denied
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        match (self.limit, self.remaining) {
            (Some(limit), Some(remaining)) => {
                headers.insert(HEADER_LIMIT, HeaderValue::from(limit));
                headers.insert(HEADER_REMAINING, HeaderValue::from(remaining));
            }
            _ => {
                headers.insert(HEADER_LIMIT, HeaderValue::from_static("unlimited"));
                headers.insert(HEADER_REMAINING, HeaderValue::from_static("unlimited"));
            }
        }
        headers.insert(HEADER_RESET, HeaderValue::from(self.reset_at));

        if !self.allowed {
            headers.insert(HEADER_RETRY_AFTER, HeaderValue::from(self.retry_after.max(0)));
        }

        headers
    }

    /// Body of the `rate_limit` envelope field on denial
    pub fn body(&self) -> RateLimitBody {
        RateLimitBody {
            limit: self.limit,
            remaining: self.remaining.unwrap_or(0),
            reset_time: self.reset_at,
            retry_after: self.retry_after,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RateLimitBody {
    pub limit: Option<u32>,
    pub remaining: u32,
    pub reset_time: i64,
    pub retry_after: i64,
}

/// Quota state of a client, reported without recording a request
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitInfo {
    /// Truncated fingerprint
    pub client_id: String,
    pub tier: Tier,
    pub whitelisted: bool,
    pub hourly_limit: u32,
    pub burst_limit: u32,
    pub remaining: u32,
    pub reset_time: i64,
    pub reset_time_human: String,
}

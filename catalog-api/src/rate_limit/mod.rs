//! Per-client rate limiting
//!
//! Hourly and burst sliding windows per client fingerprint and quota tier,
//! persisted in an expiring [`WindowStore`].

pub mod fingerprint;
pub mod limiter;
pub mod store;
pub mod types;

pub use fingerprint::ClientIdentity;
pub use limiter::RateLimiter;
pub use store::{MemoryWindowStore, SqliteWindowStore, WindowStore};
pub use types::{RateLimitBody, RateLimitDecision, RateLimitInfo, Tier, WindowKind, WindowRecord};

//! Dual-window rate limiter
//!
//! Every (fingerprint, tier) pair has an hourly and a burst window. A
//! request is allowed only if both windows have room; each window that
//! has room records the request.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use catalog_common::config::TierQuotas;
use catalog_common::time::{epoch_to_rfc3339, Clock, SystemClock};
use catalog_common::Result;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::fingerprint::ClientIdentity;
use super::store::WindowStore;
use super::types::{
    window_key, QuotaTier, RateLimitDecision, RateLimitInfo, Tier, WindowKind, WindowOutcome,
    WindowRecord,
};

/// Number of per-fingerprint lock stripes
const LOCK_STRIPES: usize = 64;

pub struct RateLimiter {
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
    quotas: TierQuotas,
    /// Serialises read-modify-write of one fingerprint's windows
    stripes: Vec<Mutex<()>>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn WindowStore>, quotas: TierQuotas) -> Self {
        Self::with_clock(store, quotas, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn WindowStore>, quotas: TierQuotas, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            quotas,
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn quota(&self, tier: Tier) -> QuotaTier {
        match tier {
            Tier::Default => self.quotas.default,
            Tier::Api => self.quotas.api,
            Tier::Strict => self.quotas.strict,
        }
    }

    fn stripe(&self, fingerprint: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        fingerprint.hash(&mut hasher);
        &self.stripes[(hasher.finish() as usize) % self.stripes.len()]
    }

    /// Count one request against `tier` for this client
    pub async fn check_limit(&self, identity: &ClientIdentity, tier: Tier) -> Result<RateLimitDecision> {
        if identity.is_whitelisted() {
            return Ok(RateLimitDecision::unlimited());
        }

        let quota = self.quota(tier);
        let _guard = self.stripe(&identity.fingerprint).lock().await;
        let now = self.clock.now_secs();

        let hourly = self.check_window(identity, tier, WindowKind::Hourly, &quota, now, true).await?;
        let burst = self.check_window(identity, tier, WindowKind::Burst, &quota, now, true).await?;

        let decision = RateLimitDecision::combine(quota.per_hour, hourly, burst);
        if !decision.allowed {
            debug!(
                client = %identity.short_id(),
                tier = %tier,
                retry_after = decision.retry_after,
                "Rate limit exceeded"
            );
        }
        Ok(decision)
    }

    async fn check_window(
        &self,
        identity: &ClientIdentity,
        tier: Tier,
        kind: WindowKind,
        quota: &QuotaTier,
        now: i64,
        consume: bool,
    ) -> Result<WindowOutcome> {
        let key = window_key(&identity.fingerprint, tier, kind);
        let mut record = self
            .store
            .get(&key, now)
            .await?
            .unwrap_or_else(|| WindowRecord::empty(identity.fingerprint.clone(), kind));

        let outcome = record.evaluate(kind.max_for(quota), now, consume);
        if consume && outcome.allowed {
            self.store.set(&key, &record).await?;
        }
        Ok(outcome)
    }

    /// Quota state for this client without recording a request
    pub async fn info(&self, identity: &ClientIdentity, tier: Tier) -> Result<RateLimitInfo> {
        let quota = self.quota(tier);
        let now = self.clock.now_secs();

        let (remaining, reset_time) = if identity.is_whitelisted() {
            (quota.per_hour.min(quota.burst), now)
        } else {
            let _guard = self.stripe(&identity.fingerprint).lock().await;
            let hourly = self.check_window(identity, tier, WindowKind::Hourly, &quota, now, false).await?;
            let burst = self.check_window(identity, tier, WindowKind::Burst, &quota, now, false).await?;
            let decision = RateLimitDecision::combine(quota.per_hour, hourly, burst);
            (decision.remaining.unwrap_or(0), decision.reset_at)
        };

        Ok(RateLimitInfo {
            client_id: identity.short_id(),
            tier,
            whitelisted: identity.is_whitelisted(),
            hourly_limit: quota.per_hour,
            burst_limit: quota.burst,
            remaining,
            reset_time,
            reset_time_human: epoch_to_rfc3339(reset_time),
        })
    }

    /// Remove every expired window record
    pub async fn sweep(&self) -> Result<u64> {
        self.store.sweep(self.clock.now_secs()).await
    }

    /// Run [`sweep`](Self::sweep) every `every` until the runtime shuts down
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        info!("Rate-limit sweeper running every {}s", every.as_secs());
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match self.sweep().await {
                    Ok(0) => {}
                    Ok(removed) => debug!("Swept {} expired rate-limit windows", removed),
                    Err(e) => warn!("Rate-limit sweep failed: {}", e),
                }
            }
        })
    }
}

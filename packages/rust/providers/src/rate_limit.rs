//! Per-provider token bucket.
//!
//! Each provider owns one limiter for the lifetime of the pool. Buckets hold
//! `requests` tokens and refill one token every `window / requests`. A caller
//! waits for a token up to `max_wait`, then gives up with
//! [`ProviderError::RateLimited`] instead of queueing forever.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tracing::debug;

use leadcascade_shared::{LeadCascadeError, RateLimit, Result};

use crate::error::ProviderError;

/// Process-wide token bucket for one provider.
pub struct ProviderRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    max_wait: Duration,
}

impl std::fmt::Debug for ProviderRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRateLimiter")
            .field("max_wait", &self.max_wait)
            .finish_non_exhaustive()
    }
}

impl ProviderRateLimiter {
    /// Build a bucket for `limit`, failing on a zero request count or window.
    pub fn new(limit: &RateLimit, max_wait: Duration) -> Result<Self> {
        let burst = NonZeroU32::new(limit.requests)
            .ok_or_else(|| LeadCascadeError::config("rate_limit.requests must be at least 1"))?;
        let period = Duration::from_millis(limit.window_ms) / limit.requests;
        let quota = Quota::with_period(period)
            .ok_or_else(|| LeadCascadeError::config("rate_limit.window_ms must be at least 1"))?
            .allow_burst(burst);

        Ok(Self {
            limiter: RateLimiter::direct(quota),
            max_wait,
        })
    }

    /// Take one token, suspending until one is available or `max_wait` elapses.
    pub async fn acquire(&self) -> std::result::Result<(), ProviderError> {
        if self.limiter.check().is_ok() {
            return Ok(());
        }

        debug!(max_wait_ms = self.max_wait.as_millis() as u64, "waiting for rate limit token");
        tokio::time::timeout(self.max_wait, self.limiter.until_ready())
            .await
            .map_err(|_| {
                ProviderError::RateLimited(format!(
                    "no token available within {}ms",
                    self.max_wait.as_millis()
                ))
            })
    }
}

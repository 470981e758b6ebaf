//! Explicit retry/backoff policy for provider calls.
//!
//! Only [`ProviderError::Timeout`] (up to `max_attempts` timed-out attempts)
//! and [`ProviderError::RateLimited`] (up to `rate_limit_retries` extra
//! attempts) are retried. The two budgets are independent, so one call makes
//! at most `max_attempts + rate_limit_retries` attempts. Auth and
//! invalid-response failures return immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use leadcascade_shared::{JitterMode, RetryConfig};

use crate::error::ProviderError;

/// Random component added to a backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    None,
    /// Replace the delay with a uniform draw from `[0, delay]`.
    Full,
    /// Add a uniform draw from `[0, max]` to the delay.
    UpTo(Duration),
}

impl Jitter {
    fn apply(&self, delay: Duration) -> Duration {
        match self {
            Self::None => delay,
            Self::Full => {
                let ms = delay.as_millis() as u64;
                Duration::from_millis(rand::thread_rng().gen_range(0..=ms))
            }
            Self::UpTo(max) => {
                let ms = max.as_millis() as u64;
                delay + Duration::from_millis(rand::thread_rng().gen_range(0..=ms))
            }
        }
    }
}

/// Retry policy passed into every pool invocation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Timed-out attempts tolerated before giving up (first call included).
    pub max_attempts: u32,
    /// Extra attempts after a rate-limit rejection.
    pub rate_limit_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Jitter,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        let jitter = match config.jitter {
            JitterMode::None => Jitter::None,
            JitterMode::Full => Jitter::Full,
            JitterMode::UpTo => Jitter::UpTo(Duration::from_millis(config.jitter_max_ms)),
        };
        Self {
            max_attempts: config.max_attempts.max(1),
            rate_limit_retries: config.rate_limit_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter,
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits between attempts. Handy in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            rate_limit_retries: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Jitter::None,
        }
    }

    /// Exponential delay before attempt `attempt + 1`, before jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(20);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds or a non-retryable failure occurs.
    ///
    /// `op` receives the 1-based attempt number. Returns the final result and
    /// how many attempts were made.
    pub async fn run<F, Fut, T>(&self, provider: &str, mut op: F) -> (Result<T, ProviderError>, u32)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        let mut timeouts_seen = 0;
        let mut rate_limit_retries_used = 0;

        loop {
            attempt += 1;
            let err = match op(attempt).await {
                Ok(value) => return (Ok(value), attempt),
                Err(e) => e,
            };

            let retry = match &err {
                ProviderError::Timeout(_) => {
                    timeouts_seen += 1;
                    timeouts_seen < self.max_attempts
                }
                ProviderError::RateLimited(_) => {
                    let allowed = rate_limit_retries_used < self.rate_limit_retries;
                    if allowed {
                        rate_limit_retries_used += 1;
                    }
                    allowed
                }
                _ => false,
            };

            if !retry {
                return (Err(err), attempt);
            }

            let delay = self.jitter.apply(self.backoff(attempt));
            warn!(
                provider,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "provider call failed, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

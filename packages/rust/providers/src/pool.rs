//! The provider pool: every configured adapter with its rate limiter and
//! run-scoped disable flag.
//!
//! The pool is built once per engine. [`ProviderPool::invoke`] is the only
//! way the cascade talks to a vendor: it waits for a token, applies the
//! per-call timeout, retries per the [`RetryPolicy`], merges the attempts
//! into one [`ProviderOutcome`] and applies the charge.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use leadcascade_shared::{
    AppConfig, Contact, ProviderConfig, ProviderErrorKind, ProviderOutcome, Result,
};

use crate::adapters::{ProviderAdapter, build_adapter};
use crate::error::ProviderError;
use crate::rate_limit::ProviderRateLimiter;
use crate::retry::RetryPolicy;

/// One provider's runtime state.
struct ProviderSlot {
    config: ProviderConfig,
    /// `None` when the provider has no API key; it never runs.
    adapter: Option<Arc<dyn ProviderAdapter>>,
    limiter: ProviderRateLimiter,
    /// Set after an auth failure. Cleared by [`ProviderPool::reset`].
    auth_disabled: AtomicBool,
}

impl ProviderSlot {
    fn is_disabled(&self) -> bool {
        self.adapter.is_none() || self.auth_disabled.load(Ordering::Acquire)
    }
}

/// Ordered set of providers shared by every cascade in a run.
pub struct ProviderPool {
    slots: Vec<ProviderSlot>,
    retry: RetryPolicy,
    max_wait: Duration,
}

impl std::fmt::Debug for ProviderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderPool")
            .field("providers", &self.names())
            .field("retry", &self.retry)
            .finish()
    }
}

impl ProviderPool {
    /// An empty pool. Add providers with [`with_provider`](Self::with_provider).
    pub fn new(retry: RetryPolicy, max_wait: Duration) -> Self {
        Self {
            slots: Vec::new(),
            retry,
            max_wait,
        }
    }

    /// Build adapters for every enabled provider, in cascade order.
    ///
    /// Providers whose API key env var is unset stay in the order but are
    /// permanently disabled, so they are skipped without being charged.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut pool = Self::new(
            RetryPolicy::from(&config.retry),
            Duration::from_millis(config.rate_limit.max_wait_ms),
        );

        for provider in config.ordered_providers() {
            let adapter = match provider.api_key() {
                Some(key) => Some(build_adapter(&provider, key)?),
                None => {
                    warn!(
                        provider = %provider.name,
                        env = %provider.api_key_var(),
                        "API key not set, provider disabled"
                    );
                    None
                }
            };
            pool.push(provider, adapter)?;
        }

        info!(providers = pool.len(), "provider pool ready");
        Ok(pool)
    }

    /// Append a provider backed by an already-built adapter.
    pub fn with_provider(
        mut self,
        config: ProviderConfig,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> Result<Self> {
        self.push(config, Some(adapter))?;
        Ok(self)
    }

    fn push(&mut self, config: ProviderConfig, adapter: Option<Arc<dyn ProviderAdapter>>) -> Result<()> {
        let limiter = ProviderRateLimiter::new(&config.rate_limit, self.max_wait)?;
        self.slots.push(ProviderSlot {
            config,
            adapter,
            limiter,
            auth_disabled: AtomicBool::new(false),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Provider names in cascade order.
    pub fn names(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.config.name.clone()).collect()
    }

    pub fn config(&self, index: usize) -> Option<&ProviderConfig> {
        self.slots.get(index).map(|s| &s.config)
    }

    /// Whether the provider at `index` is skipped for the rest of the run.
    pub fn is_disabled(&self, index: usize) -> bool {
        self.slots.get(index).is_none_or(ProviderSlot::is_disabled)
    }

    /// Names of currently disabled providers.
    pub fn disabled_providers(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|s| s.is_disabled())
            .map(|s| s.config.name.clone())
            .collect()
    }

    /// Re-enable providers disabled by auth failures, ready for a new run.
    pub fn reset(&self) {
        for slot in &self.slots {
            slot.auth_disabled.store(false, Ordering::Release);
        }
    }

    /// Invoke the provider at `index` for one contact.
    ///
    /// Never fails: every error ends up in the returned outcome. An auth
    /// failure disables the provider for the remainder of the run.
    pub async fn invoke(&self, index: usize, contact: &Contact) -> ProviderOutcome {
        let Some(slot) = self.slots.get(index) else {
            return ProviderOutcome::failed(
                "unknown",
                ProviderErrorKind::Unavailable,
                format!("no provider at position {index}"),
            );
        };
        let name = slot.config.name.as_str();
        let Some(adapter) = slot.adapter.as_deref() else {
            return ProviderOutcome::failed(name, ProviderErrorKind::Auth, "API key not configured");
        };

        let limiter = &slot.limiter;
        let timeout = Duration::from_millis(slot.config.timeout_ms);
        let start = Instant::now();

        let (result, attempts) = self
            .retry
            .run(name, move |attempt| async move {
                limiter.acquire().await?;
                debug!(provider = name, attempt, "calling provider");
                match tokio::time::timeout(timeout, adapter.invoke(contact)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(format!(
                        "{name}: no response within {}ms",
                        timeout.as_millis()
                    ))),
                }
            })
            .await;

        let mut outcome = match result {
            Ok(hit) if hit.email.is_some() || hit.phone.is_some() => {
                ProviderOutcome::matched(name, hit.email, hit.phone, hit.native_confidence)
            }
            Ok(_) => ProviderOutcome::no_match(name),
            // Malformed payload counts as "found nothing"; the error stays visible
            Err(err @ ProviderError::InvalidResponse(_)) => ProviderOutcome {
                error_kind: Some(err.kind()),
                error: Some(err.to_string()),
                ..ProviderOutcome::no_match(name)
            },
            Err(err) => {
                if let ProviderError::Auth(_) = err {
                    if !slot.auth_disabled.swap(true, Ordering::AcqRel) {
                        warn!(provider = name, error = %err, "authentication failed, provider disabled for this run");
                    }
                }
                ProviderOutcome::failed(name, err.kind(), err.to_string())
            }
        };

        outcome.attempts = attempts;
        outcome.raw_latency_ms = start.elapsed().as_millis() as u64;
        outcome.cost = charge(&slot.config, &outcome);

        debug!(
            provider = name,
            succeeded = outcome.succeeded,
            has_data = outcome.has_contact_data(),
            attempts,
            latency_ms = outcome.raw_latency_ms,
            cost = outcome.cost,
            "provider outcome"
        );
        outcome
    }
}

/// Amount charged for one invocation: one request, however many attempts.
fn charge(config: &ProviderConfig, outcome: &ProviderOutcome) -> f64 {
    match outcome.error_kind {
        Some(ProviderErrorKind::InvalidResponse) if !config.bill_invalid_responses => 0.0,
        _ => config.cost_per_request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ProviderMatch;
    use async_trait::async_trait;
    use leadcascade_shared::{NativeConfidence, ProviderKind, RateLimit};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;

    /// Replays a fixed list of replies, then answers "no match".
    struct Scripted {
        name: String,
        replies: Mutex<VecDeque<std::result::Result<ProviderMatch, ProviderError>>>,
        delay: Duration,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(name: &str, replies: Vec<std::result::Result<ProviderMatch, ProviderError>>) -> Self {
            Self {
                name: name.into(),
                replies: Mutex::new(replies.into()),
                delay: Duration::ZERO,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ProviderAdapter for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        async fn invoke(&self, _contact: &Contact) -> std::result::Result<ProviderMatch, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.replies.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(ProviderMatch::none()))
        }
    }

    fn provider(name: &str, cost: f64) -> ProviderConfig {
        ProviderConfig::new(
            name,
            ProviderKind::Hunter,
            cost,
            RateLimit {
                requests: 100,
                window_ms: 1_000,
            },
        )
    }

    fn pool() -> ProviderPool {
        ProviderPool::new(RetryPolicy::immediate(3), Duration::from_millis(100))
    }

    fn hit(email: &str) -> ProviderMatch {
        ProviderMatch {
            email: Some(email.into()),
            phone: None,
            native_confidence: NativeConfidence::Probability(85.0),
        }
    }

    #[tokio::test]
    async fn match_is_charged_once() {
        let adapter = Arc::new(Scripted::new("a", vec![Ok(hit("jane@acme.io"))]));
        let pool = pool().with_provider(provider("a", 0.02), adapter).unwrap();

        let outcome = pool.invoke(0, &Contact::new("Jane", "Doe", "Acme")).await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.email.as_deref(), Some("jane@acme.io"));
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.cost, 0.02);
    }

    #[tokio::test]
    async fn timeouts_merge_into_one_outcome() {
        let adapter = Arc::new(Scripted {
            delay: Duration::from_millis(200),
            ..Scripted::new("slow", vec![])
        });
        let mut config = provider("slow", 0.05);
        config.timeout_ms = 20;
        let pool = pool().with_provider(config, adapter.clone()).unwrap();

        let outcome = pool.invoke(0, &Contact::new("Jane", "Doe", "Acme")).await;
        assert!(!outcome.succeeded);
        assert_eq!(outcome.error_kind, Some(ProviderErrorKind::Timeout));
        assert_eq!(outcome.attempts, 3);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.cost, 0.05);
        assert_eq!(outcome.confidence, 0.0);
    }

    #[tokio::test]
    async fn auth_failure_disables_until_reset() {
        let adapter = Arc::new(Scripted::new(
            "a",
            vec![Err(ProviderError::Auth("HTTP 401".into()))],
        ));
        let pool = pool().with_provider(provider("a", 0.01), adapter).unwrap();

        assert!(!pool.is_disabled(0));
        let outcome = pool.invoke(0, &Contact::new("Jane", "Doe", "Acme")).await;
        assert_eq!(outcome.error_kind, Some(ProviderErrorKind::Auth));
        assert_eq!(outcome.attempts, 1);
        assert!(pool.is_disabled(0));
        assert_eq!(pool.disabled_providers(), vec!["a".to_string()]);

        pool.reset();
        assert!(!pool.is_disabled(0));
    }

    #[tokio::test]
    async fn invalid_response_billing_follows_flag() {
        let contact = Contact::new("Jane", "Doe", "Acme");

        let billed = pool()
            .with_provider(
                provider("a", 0.03),
                Arc::new(Scripted::new("a", vec![Err(ProviderError::InvalidResponse("eof".into()))])),
            )
            .unwrap();
        let outcome = billed.invoke(0, &contact).await;
        assert!(outcome.succeeded);
        assert!(!outcome.has_contact_data());
        assert_eq!(outcome.error_kind, Some(ProviderErrorKind::InvalidResponse));
        assert!(outcome.error.is_some());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.cost, 0.03);

        let mut config = provider("b", 0.03);
        config.bill_invalid_responses = false;
        let unbilled = pool()
            .with_provider(
                config,
                Arc::new(Scripted::new("b", vec![Err(ProviderError::InvalidResponse("eof".into()))])),
            )
            .unwrap();
        assert_eq!(unbilled.invoke(0, &contact).await.cost, 0.0);
    }

    #[tokio::test]
    async fn empty_match_is_no_match() {
        let pool = pool()
            .with_provider(provider("a", 0.01), Arc::new(Scripted::new("a", vec![])))
            .unwrap();
        let outcome = pool.invoke(0, &Contact::new("Jane", "Doe", "Acme")).await;
        assert!(outcome.succeeded);
        assert!(!outcome.has_contact_data());
        assert_eq!(outcome.native_confidence, NativeConfidence::Absent);
    }

    #[test]
    fn missing_api_key_disables_provider() {
        let mut config = AppConfig::default();
        let mut p = provider("nokey", 0.01);
        p.api_key_env = Some("LEADCASCADE_TEST_DEFINITELY_UNSET_KEY".into());
        config.providers = vec![p];

        let pool = ProviderPool::from_config(&config).unwrap();
        assert_eq!(pool.names(), vec!["nokey".to_string()]);
        assert!(pool.is_disabled(0));
        pool.reset();
        assert!(pool.is_disabled(0));
    }

    #[tokio::test]
    async fn local_rate_limit_is_retried_once_then_reported() {
        let adapter = Arc::new(Scripted::new("a", vec![Ok(hit("jane@acme.io"))]));
        let config = ProviderConfig {
            rate_limit: RateLimit {
                requests: 1,
                window_ms: 60_000,
            },
            ..provider("a", 0.01)
        };
        let pool = ProviderPool::new(RetryPolicy::immediate(3), Duration::from_millis(20))
            .with_provider(config, adapter.clone())
            .unwrap();
        let contact = Contact::new("Jane", "Doe", "Acme");

        let first = pool.invoke(0, &contact).await;
        assert!(first.succeeded);
        assert_eq!(first.attempts, 1);

        let second = pool.invoke(0, &contact).await;
        assert!(!second.succeeded);
        assert_eq!(second.error_kind, Some(ProviderErrorKind::RateLimited));
        assert_eq!(second.attempts, 2);
        assert_eq!(second.cost, 0.01);
        // Neither attempt got past the limiter
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
        assert!(!pool.is_disabled(0));
    }

    #[test]
    fn out_of_range_index_is_disabled() {
        assert!(pool().is_disabled(7));
    }
}

//! In-memory collaborators for cascade and batch tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use leadcascade_providers::{
    ProviderAdapter, ProviderError, ProviderMatch, ProviderPool, RetryPolicy,
};
use leadcascade_shared::{
    CascadeConfig, Contact, EmailVerificationConfig, NativeConfidence, PhoneVerificationConfig,
    ProviderConfig, ProviderKind, RateLimit,
};
use leadcascade_verify::{
    DnsResolver, EmailVerifier, PhoneVerifier, RcptReply, SmtpProber, VerificationInfraError,
};

use crate::cascade::CascadeOrchestrator;
use crate::scorer::{Calibration, ConfidenceScorer};

type Reply = Result<ProviderMatch, ProviderError>;
type Script = dyn Fn(u32, &Contact) -> Reply + Send + Sync;
type Delay = dyn Fn(&Contact) -> Duration + Send + Sync;

/// Adapter whose replies come from a closure of (1-based call number, contact).
pub struct ScriptedAdapter {
    name: String,
    script: Box<Script>,
    delay: Option<Box<Delay>>,
    calls: AtomicU32,
}

impl ScriptedAdapter {
    pub fn new(name: &str, script: impl Fn(u32, &Contact) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            script: Box::new(script),
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Sleep before answering, per contact.
    pub fn with_delay(mut self, delay: impl Fn(&Contact) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }

    /// Always answers with a Hunter-style percentage score.
    pub fn scoring(name: &str, percent: f64) -> Self {
        let email = format!("jane@{name}.example");
        Self::new(name, move |_, _| Ok(probability_hit(&email, percent)))
    }

    /// Always answers "no match".
    pub fn empty(name: &str) -> Self {
        Self::new(name, |_, _| Ok(ProviderMatch::none()))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, contact: &Contact) -> Result<ProviderMatch, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(contact)).await;
        }
        (self.script)(call, contact)
    }
}

pub fn probability_hit(email: &str, percent: f64) -> ProviderMatch {
    ProviderMatch {
        email: Some(email.to_string()),
        phone: None,
        native_confidence: NativeConfidence::Probability(percent),
    }
}

pub fn provider_config(name: &str, cost: f64) -> ProviderConfig {
    ProviderConfig::new(
        name,
        ProviderKind::Hunter,
        cost,
        RateLimit {
            requests: 1_000,
            window_ms: 1_000,
        },
    )
}

/// Pool over the given adapters, in order, with hunter-style calibration.
pub fn pool_of(adapters: Vec<(Arc<ScriptedAdapter>, f64)>) -> (Arc<ProviderPool>, ConfidenceScorer) {
    let mut pool = ProviderPool::new(RetryPolicy::immediate(2), Duration::from_millis(200));
    let mut scorer = ConfidenceScorer::default();
    for (adapter, cost) in adapters {
        let name = adapter.name().to_string();
        scorer.set(&name, Calibration::for_kind(ProviderKind::Hunter));
        pool = pool
            .with_provider(provider_config(&name, cost), adapter)
            .expect("valid provider");
    }
    (Arc::new(pool), scorer)
}

/// DNS where every domain resolves and has `mx.<domain>` as its exchanger.
pub struct StaticDns;

#[async_trait]
impl DnsResolver for StaticDns {
    async fn has_address(&self, _domain: &str) -> Result<bool, VerificationInfraError> {
        Ok(true)
    }

    async fn mx_hosts(&self, domain: &str) -> Result<Vec<String>, VerificationInfraError> {
        Ok(vec![format!("mx.{domain}")])
    }
}

/// SMTP that accepts addresses whose local part is not `ghost`.
pub struct PickySmtp;

#[async_trait]
impl SmtpProber for PickySmtp {
    async fn check_recipients(
        &self,
        _mx_host: &str,
        recipients: &[String],
    ) -> Result<Vec<RcptReply>, VerificationInfraError> {
        Ok(recipients
            .iter()
            .map(|r| {
                if r.starts_with("ghost@") || r.starts_with("lc-probe-") {
                    RcptReply(550)
                } else {
                    RcptReply(250)
                }
            })
            .collect())
    }
}

pub fn email_verifier() -> Arc<EmailVerifier> {
    Arc::new(EmailVerifier::new(
        &EmailVerificationConfig::default(),
        Arc::new(StaticDns),
        Arc::new(PickySmtp),
    ))
}

pub fn orchestrator(pool: Arc<ProviderPool>, scorer: ConfidenceScorer) -> CascadeOrchestrator {
    CascadeOrchestrator::new(
        CascadeConfig::default(),
        pool,
        scorer,
        email_verifier(),
        PhoneVerifier::new(&PhoneVerificationConfig::default()),
    )
}

//! Per-contact cascade: query providers in order until one is confident
//! enough, pick the best answer, then verify it.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, instrument};

use leadcascade_providers::ProviderPool;
use leadcascade_shared::{
    CascadeConfig, Contact, EmailVerification, EnrichmentResult, EnrichmentStatus,
    PhoneVerification, ProviderOutcome, StopReason,
};
use leadcascade_verify::{EmailVerifier, PhoneVerifier};

use crate::scorer::{ConfidenceScorer, select_best};

/// Runs the cascade for one contact at a time. Shared across batch tasks.
pub struct CascadeOrchestrator {
    config: CascadeConfig,
    pool: Arc<ProviderPool>,
    scorer: ConfidenceScorer,
    email: Arc<EmailVerifier>,
    phone: PhoneVerifier,
}

impl std::fmt::Debug for CascadeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadeOrchestrator")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// What the provider phase produced, before verification.
struct Selection {
    email: Option<String>,
    phone: Option<String>,
    confidence: f64,
    source_provider: Option<String>,
    phone_source: Option<String>,
}

impl CascadeOrchestrator {
    pub fn new(
        config: CascadeConfig,
        pool: Arc<ProviderPool>,
        scorer: ConfidenceScorer,
        email: Arc<EmailVerifier>,
        phone: PhoneVerifier,
    ) -> Self {
        Self {
            config,
            pool,
            scorer,
            email,
            phone,
        }
    }

    pub fn pool(&self) -> &Arc<ProviderPool> {
        &self.pool
    }

    /// Enrich one contact. Never fails; problems are recorded in the result.
    #[instrument(skip_all, fields(contact = %contact.display_name().unwrap_or_default()))]
    pub async fn enrich(&self, contact: &Contact) -> EnrichmentResult {
        let start = Instant::now();

        if !contact.has_name() {
            debug!("contact has no name, skipping providers");
            return EnrichmentResult::failed(
                contact.id.clone(),
                vec!["contact has no first, last or full name".into()],
                start.elapsed().as_millis() as u64,
            );
        }

        let (tried, stop_reason) = self.run_providers(contact).await;
        let selection = self.select(&tried);

        let mut errors: Vec<String> = tried
            .iter()
            .filter_map(|o| o.error.as_ref().map(|e| format!("{}: {e}", o.provider_name)))
            .collect();
        if tried.is_empty() {
            errors.push("no provider available".into());
        }
        let status = if selection.email.is_some() || selection.phone.is_some() {
            EnrichmentStatus::Matched
        } else if tried.is_empty() || tried.iter().all(|o| !o.succeeded) {
            EnrichmentStatus::Failed
        } else {
            EnrichmentStatus::NoMatch
        };

        // Verification runs on the final selection and never reopens the cascade
        let (email_verification, email_verified) = match (&selection.email, self.config.verify_email) {
            (Some(email), true) => {
                let v = self.email.verify(email).await;
                let ok = self.email.is_verified(&v);
                (v, ok)
            }
            _ => (EmailVerification::default(), false),
        };
        let (phone_verification, phone_verified) = match (&selection.phone, self.config.verify_phone) {
            (Some(phone), true) => {
                let hint = self.phone.country_hint(contact);
                let v = self.phone.verify(phone, Some(&hint));
                let ok = self.phone.is_verified(&v);
                (v, ok)
            }
            _ => (PhoneVerification::default(), false),
        };

        let verified_confidence = if stop_reason == StopReason::ExcellentConfidence {
            selection.confidence
        } else {
            let mut factor = 1.0;
            if selection.email.is_some() && self.config.verify_email && !email_verified {
                factor *= self.config.unverified_discount;
            }
            if selection.phone.is_some() && self.config.verify_phone && !phone_verified {
                factor *= self.config.unverified_discount;
            }
            selection.confidence * factor
        };

        let total_cost: f64 = tried.iter().map(|o| o.cost).sum();

        let result = EnrichmentResult {
            contact_id: contact.id.clone(),
            status,
            email: selection.email,
            phone: selection.phone,
            confidence: selection.confidence,
            verified_confidence,
            source_provider: selection.source_provider,
            phone_source: selection.phone_source,
            providers_tried: tried,
            total_cost,
            processing_time_ms: start.elapsed().as_millis() as u64,
            stop_reason: Some(stop_reason),
            email_verified,
            phone_verified,
            email_verification,
            phone_verification,
            errors,
            enriched_at: Utc::now(),
        };

        info!(
            status = ?result.status,
            confidence = result.confidence,
            providers = result.providers_tried.len(),
            cost = result.total_cost,
            stop = ?stop_reason,
            elapsed_ms = result.processing_time_ms,
            "contact enriched"
        );
        result
    }

    /// Invoke providers in order, skipping disabled ones, until a stop rule fires.
    async fn run_providers(&self, contact: &Contact) -> (Vec<ProviderOutcome>, StopReason) {
        let max = self.config.max_providers_per_contact;
        let mut tried: Vec<ProviderOutcome> = Vec::new();

        for index in 0..self.pool.len() {
            if self.pool.is_disabled(index) {
                debug!(index, "provider disabled, skipping");
                continue;
            }

            let mut outcome = self.pool.invoke(index, contact).await;
            outcome.confidence = self.scorer.score(&outcome);
            let confidence = outcome.confidence;
            debug!(
                provider = %outcome.provider_name,
                confidence,
                succeeded = outcome.succeeded,
                "provider tried"
            );
            tried.push(outcome);

            if confidence >= self.config.excellent_confidence_threshold {
                return (tried, StopReason::ExcellentConfidence);
            }
            if confidence >= self.config.high_confidence_threshold {
                return (tried, StopReason::HighConfidence);
            }
            if tried.len() >= max {
                return (tried, StopReason::MaxProviders);
            }
        }

        (tried, StopReason::Exhausted)
    }

    /// Best outcome, with the phone borrowed from the next best outcome when
    /// the winner has none.
    fn select(&self, tried: &[ProviderOutcome]) -> Selection {
        let Some(best) = select_best(tried) else {
            return Selection {
                email: None,
                phone: None,
                confidence: 0.0,
                source_provider: None,
                phone_source: None,
            };
        };
        let winner = &tried[best];

        let (phone, phone_source) = match &winner.phone {
            Some(phone) => (Some(phone.clone()), None),
            None => {
                let donor = tried
                    .iter()
                    .enumerate()
                    .filter(|(i, o)| *i != best && o.succeeded && o.phone.is_some())
                    .fold(None::<&ProviderOutcome>, |acc, (_, o)| match acc {
                        Some(a) if a.confidence >= o.confidence => Some(a),
                        _ => Some(o),
                    });
                match donor {
                    Some(d) => (d.phone.clone(), Some(d.provider_name.clone())),
                    None => (None, None),
                }
            }
        };

        Selection {
            email: winner.email.clone(),
            phone,
            confidence: winner.confidence,
            source_provider: Some(winner.provider_name.clone()),
            phone_source,
        }
    }
}

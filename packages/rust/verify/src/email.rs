//! Four-level email verification.
//!
//! Levels run in order and stop at the first failure:
//!
//! | Level | Check | Score on failure |
//! |---|---|---|
//! | 1 | syntax | 0 (`invalid_syntax`) |
//! | 2 | domain has A/AAAA | 10 (`domain_not_found`) |
//! | 3 | domain has MX | 30 (`no_mx_record`) |
//! | 4 | SMTP `RCPT TO` | 50 on 5xx (`mailbox_not_found`), 80 when inconclusive |
//!
//! Passing all four scores 100. Disposable domains cap at 20, role-based
//! local parts lose 15 and catch-all domains cap at 70.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, instrument, warn};

use leadcascade_shared::{EmailReason, EmailVerification, EmailVerificationConfig};

use crate::dns::{DnsResolver, HickoryDns};
use crate::lists::DomainLists;
use crate::smtp::{SmtpProber, TcpSmtpProber};

const SCORE_DOMAIN_FAILED: u8 = 10;
const SCORE_MX_FAILED: u8 = 30;
const SCORE_MAILBOX_REJECTED: u8 = 50;
const SCORE_SMTP_INCONCLUSIVE: u8 = 80;
const SCORE_DELIVERABLE: u8 = 100;

const ROLE_PENALTY: u8 = 15;
const CATCHALL_CAP: u8 = 70;
const DISPOSABLE_CAP: u8 = 20;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Pragmatic subset of RFC 5321: dot-atom local part, LDH labels, alpha TLD
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,63}$",
    )
    .expect("valid regex")
});

/// Split an address into local part and lowercased domain, if it is well formed.
pub fn parse_address(email: &str) -> Option<(&str, String)> {
    if email.len() > 254 || !EMAIL_RE.is_match(email) {
        return None;
    }
    let (local, domain) = email.rsplit_once('@')?;
    if local.len() > 64 {
        return None;
    }
    Some((local, domain.to_lowercase()))
}

/// Local part for the catch-all probe. Derived from the address so repeated
/// runs send the same probe.
fn catchall_probe(email: &str, domain: &str) -> String {
    let mut hasher = DefaultHasher::new();
    email.to_lowercase().hash(&mut hasher);
    format!("lc-probe-{:016x}@{domain}", hasher.finish())
}

/// Runs the verification levels against injected DNS and SMTP backends.
pub struct EmailVerifier {
    dns: Arc<dyn DnsResolver>,
    smtp: Arc<dyn SmtpProber>,
    lists: DomainLists,
    smtp_enabled: bool,
    verified_min_score: u8,
}

impl std::fmt::Debug for EmailVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailVerifier")
            .field("smtp_enabled", &self.smtp_enabled)
            .field("verified_min_score", &self.verified_min_score)
            .finish_non_exhaustive()
    }
}

impl EmailVerifier {
    pub fn new(
        config: &EmailVerificationConfig,
        dns: Arc<dyn DnsResolver>,
        smtp: Arc<dyn SmtpProber>,
    ) -> Self {
        Self {
            dns,
            smtp,
            lists: DomainLists::new(&config.extra_disposable_domains, &config.extra_role_prefixes),
            smtp_enabled: config.smtp_enabled,
            verified_min_score: config.verified_min_score,
        }
    }

    /// Production verifier: hickory DNS and a TCP SMTP prober.
    pub fn from_config(config: &EmailVerificationConfig) -> Self {
        Self::new(
            config,
            Arc::new(HickoryDns::new(Duration::from_millis(config.dns_timeout_ms))),
            Arc::new(TcpSmtpProber::new(config)),
        )
    }

    /// Whether a verification result counts as `email_verified`.
    pub fn is_verified(&self, verification: &EmailVerification) -> bool {
        verification.score >= self.verified_min_score
    }

    /// Verify one address. Infrastructure failures degrade the result, they
    /// never surface as errors.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn verify(&self, email: &str) -> EmailVerification {
        let email = email.trim();
        let mut v = EmailVerification::default();

        let Some((local, domain)) = parse_address(email) else {
            v.reason = EmailReason::InvalidSyntax;
            debug!(score = 0, "invalid syntax");
            return v;
        };
        v.syntax_valid = true;
        v.is_disposable = self.lists.is_disposable(&domain);
        v.is_role_based = self.lists.is_role_based(local);

        let (base, reason) = self.check_levels(email, &domain, &mut v).await;
        v.score = base;
        v.reason = reason;
        self.apply_modifiers(&mut v);

        debug!(score = v.score, reason = v.reason.as_str(), "email verified");
        v
    }

    /// Levels 2 to 4. Returns the base score and reason.
    async fn check_levels(
        &self,
        email: &str,
        domain: &str,
        v: &mut EmailVerification,
    ) -> (u8, EmailReason) {
        match self.dns.has_address(domain).await {
            Ok(true) => v.domain_valid = true,
            Ok(false) => return (SCORE_DOMAIN_FAILED, EmailReason::DomainNotFound),
            Err(e) => {
                warn!(domain, error = %e, "address lookup failed");
                return (SCORE_DOMAIN_FAILED, EmailReason::DomainNotFound);
            }
        }

        let mx_host = match self.dns.mx_hosts(domain).await {
            Ok(hosts) => hosts.into_iter().next(),
            Err(e) => {
                warn!(domain, error = %e, "MX lookup failed");
                None
            }
        };
        let Some(mx_host) = mx_host else {
            return (SCORE_MX_FAILED, EmailReason::NoMxRecord);
        };
        v.mx_valid = true;
        v.mx_host = Some(mx_host.clone());

        if !self.smtp_enabled {
            return (SCORE_SMTP_INCONCLUSIVE, EmailReason::SmtpSkipped);
        }

        let recipients = [email.to_string(), catchall_probe(email, domain)];
        let replies = match self.smtp.check_recipients(&mx_host, &recipients).await {
            Ok(replies) => replies,
            Err(e) => {
                debug!(mx = %mx_host, error = %e, "SMTP probe inconclusive");
                return (SCORE_SMTP_INCONCLUSIVE, EmailReason::SmtpUnverified);
            }
        };

        match replies.first() {
            Some(target) if target.is_accepted() => {
                v.is_catchall = replies.get(1).is_some_and(|probe| probe.is_accepted());
                v.smtp_deliverable = !v.is_catchall;
                (SCORE_DELIVERABLE, EmailReason::Deliverable)
            }
            Some(target) if target.is_rejected() => {
                (SCORE_MAILBOX_REJECTED, EmailReason::MailboxNotFound)
            }
            // 4xx, greylisting and the like
            _ => (SCORE_SMTP_INCONCLUSIVE, EmailReason::SmtpUnverified),
        }
    }

    /// Role penalty, then catch-all and disposable caps. Flags outrank the
    /// reason of a passing result: disposable, then catch-all, then role.
    fn apply_modifiers(&self, v: &mut EmailVerification) {
        if v.is_role_based {
            v.score = v.score.saturating_sub(ROLE_PENALTY);
        }
        if v.is_catchall {
            v.score = v.score.min(CATCHALL_CAP);
        }
        if v.is_disposable {
            v.score = v.score.min(DISPOSABLE_CAP);
        }

        let passing = matches!(
            v.reason,
            EmailReason::Deliverable | EmailReason::SmtpUnverified | EmailReason::SmtpSkipped
        );
        if passing {
            if v.is_disposable {
                v.reason = EmailReason::DisposableDomain;
            } else if v.is_catchall {
                v.reason = EmailReason::CatchallDomain;
            } else if v.is_role_based {
                v.reason = EmailReason::RoleBased;
            }
        }
    }
}

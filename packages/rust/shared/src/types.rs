//! Core domain types: contacts in, enrichment results out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one batch run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Contact
// ---------------------------------------------------------------------------

/// A partial contact record supplied by the ingestion layer.
///
/// Never mutated by the engine. At least one of `full_name` or
/// `first_name`/`last_name` must be non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Caller-side correlation id, echoed into the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    /// ISO-3166 alpha-2 country hint used when parsing phone numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Contact {
    /// Convenience constructor for the common first/last/company shape.
    pub fn new(first_name: &str, last_name: &str, company: &str) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            company: non_empty(company),
            ..Default::default()
        }
    }

    /// Whether the record carries enough of a name to query providers.
    pub fn has_name(&self) -> bool {
        !self.first_name.trim().is_empty()
            || !self.last_name.trim().is_empty()
            || self
                .full_name
                .as_deref()
                .is_some_and(|n| !n.trim().is_empty())
    }

    /// Full display name, preferring the explicit `full_name`.
    pub fn display_name(&self) -> Option<String> {
        if let Some(full) = self.full_name.as_deref().and_then(non_empty) {
            return Some(full);
        }
        let joined = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        non_empty(joined.trim())
    }

    /// First and last name, split from `full_name` when the parts are missing.
    ///
    /// Everything after the first whitespace-separated token becomes the last name.
    pub fn name_parts(&self) -> (String, String) {
        let first = self.first_name.trim();
        let last = self.last_name.trim();
        if !first.is_empty() || !last.is_empty() {
            return (first.to_string(), last.to_string());
        }

        let full = self.full_name.as_deref().unwrap_or("").trim();
        match full.split_once(char::is_whitespace) {
            Some((f, l)) => (f.to_string(), l.trim().to_string()),
            None => (full.to_string(), String::new()),
        }
    }

    /// Non-empty company name, if any.
    pub fn company_name(&self) -> Option<&str> {
        self.company.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    /// Normalized company domain: lowercase, no scheme, no `www.`, no path.
    pub fn domain(&self) -> Option<String> {
        let raw = self.company_domain.as_deref()?.trim().to_lowercase();
        let without_scheme = raw
            .strip_prefix("https://")
            .or_else(|| raw.strip_prefix("http://"))
            .unwrap_or(&raw);
        let host = without_scheme
            .split(['/', '?', '#'])
            .next()
            .unwrap_or("");
        let host = host.strip_prefix("www.").unwrap_or(host);
        non_empty(host)
    }
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

// ---------------------------------------------------------------------------
// Provider outcomes
// ---------------------------------------------------------------------------

/// A vendor's own confidence signal, before calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NativeConfidence {
    /// Numeric score on the vendor's own scale (e.g. 0–100 or 1–10).
    Probability(f64),
    /// Categorical label such as `verified` or `guessed`.
    Label(String),
    /// Plain "found / not found".
    Found(bool),
    /// The vendor returned no confidence signal at all.
    Absent,
}

/// Why a provider invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Invalid credentials; the provider is disabled for the rest of the run.
    Auth,
    /// Vendor or local rate limit hit.
    RateLimited,
    /// Call exceeded its timeout.
    Timeout,
    /// Payload could not be decoded.
    InvalidResponse,
    /// Transport failure or unexpected HTTP status.
    Unavailable,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::InvalidResponse => "invalid_response",
            Self::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The merged result of invoking one provider for one contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutcome {
    pub provider_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub native_confidence: NativeConfidence,
    /// Canonical 0–1 confidence, filled in by the scorer.
    #[serde(default)]
    pub confidence: f64,
    /// Wall time across all attempts, in milliseconds.
    pub raw_latency_ms: u64,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ProviderErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of wire attempts merged into this outcome.
    #[serde(default)]
    pub attempts: u32,
    /// Amount charged for this invocation.
    #[serde(default)]
    pub cost: f64,
}

impl ProviderOutcome {
    /// A successful call that returned contact data.
    pub fn matched(
        provider: &str,
        email: Option<String>,
        phone: Option<String>,
        native_confidence: NativeConfidence,
    ) -> Self {
        Self {
            provider_name: provider.to_string(),
            email,
            phone,
            native_confidence,
            confidence: 0.0,
            raw_latency_ms: 0,
            succeeded: true,
            error_kind: None,
            error: None,
            attempts: 1,
            cost: 0.0,
        }
    }

    /// A successful call where the vendor found nothing.
    pub fn no_match(provider: &str) -> Self {
        Self::matched(provider, None, None, NativeConfidence::Absent)
    }

    /// A call that ended in an error after any retries.
    pub fn failed(provider: &str, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            error_kind: Some(kind),
            error: Some(message.into()),
            ..Self::no_match(provider)
        }
    }

    /// Whether the outcome carries an email or a phone.
    pub fn has_contact_data(&self) -> bool {
        self.email.is_some() || self.phone.is_some()
    }
}

// ---------------------------------------------------------------------------
// Verification details
// ---------------------------------------------------------------------------

/// Terminal reason of the email verification state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailReason {
    NotChecked,
    InvalidSyntax,
    DomainNotFound,
    NoMxRecord,
    MailboxNotFound,
    SmtpUnverified,
    SmtpSkipped,
    DisposableDomain,
    CatchallDomain,
    RoleBased,
    Deliverable,
}

impl EmailReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotChecked => "not_checked",
            Self::InvalidSyntax => "invalid_syntax",
            Self::DomainNotFound => "domain_not_found",
            Self::NoMxRecord => "no_mx_record",
            Self::MailboxNotFound => "mailbox_not_found",
            Self::SmtpUnverified => "smtp_unverified",
            Self::SmtpSkipped => "smtp_skipped",
            Self::DisposableDomain => "disposable_domain",
            Self::CatchallDomain => "catchall_domain",
            Self::RoleBased => "role_based",
            Self::Deliverable => "deliverable",
        }
    }
}

/// Result of the four-level email check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailVerification {
    pub syntax_valid: bool,
    pub domain_valid: bool,
    pub mx_valid: bool,
    pub smtp_deliverable: bool,
    pub is_disposable: bool,
    pub is_role_based: bool,
    pub is_catchall: bool,
    /// 0–100.
    pub score: u8,
    pub reason: EmailReason,
    /// MX host the SMTP probe talked to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mx_host: Option<String>,
}

impl Default for EmailVerification {
    fn default() -> Self {
        Self {
            syntax_valid: false,
            domain_valid: false,
            mx_valid: false,
            smtp_deliverable: false,
            is_disposable: false,
            is_role_based: false,
            is_catchall: false,
            score: 0,
            reason: EmailReason::NotChecked,
            mx_host: None,
        }
    }
}

/// Phone line classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineType {
    Mobile,
    Landline,
    Voip,
    Unknown,
}

/// Terminal reason of the phone check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneReason {
    NotChecked,
    Unparseable,
    InvalidNumber,
    VoipNumber,
    UnknownLineType,
    Valid,
}

/// Result of parsing and classifying a phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneVerification {
    pub is_valid: bool,
    pub line_type: Option<LineType>,
    /// ISO-3166 alpha-2 region.
    pub country: Option<String>,
    pub carrier: Option<String>,
    pub formatted_international: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e164: Option<String>,
    /// 0–100.
    pub score: u8,
    pub reason: PhoneReason,
}

impl Default for PhoneVerification {
    fn default() -> Self {
        Self {
            is_valid: false,
            line_type: None,
            country: None,
            carrier: None,
            formatted_international: None,
            e164: None,
            score: 0,
            reason: PhoneReason::NotChecked,
        }
    }
}

// ---------------------------------------------------------------------------
// EnrichmentResult
// ---------------------------------------------------------------------------

/// Overall classification of a contact's enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    /// An email or a phone was found.
    Matched,
    /// Providers answered but found nothing.
    NoMatch,
    /// Every provider errored, the contact was invalid, or the task crashed.
    Failed,
}

/// Why the cascade stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    HighConfidence,
    ExcellentConfidence,
    MaxProviders,
    Exhausted,
}

/// Everything the engine hands back for one contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    pub status: EnrichmentStatus,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Canonical confidence of the selected outcome.
    pub confidence: f64,
    /// `confidence` after the verification discount.
    pub verified_confidence: f64,
    pub source_provider: Option<String>,
    /// Provider the phone came from when it differs from `source_provider`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_source: Option<String>,
    pub providers_tried: Vec<ProviderOutcome>,
    pub total_cost: f64,
    pub processing_time_ms: u64,
    pub stop_reason: Option<StopReason>,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub email_verification: EmailVerification,
    pub phone_verification: PhoneVerification,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub enriched_at: DateTime<Utc>,
}

impl EnrichmentResult {
    /// A failed result carrying no data, only error notes.
    pub fn failed(contact_id: Option<String>, errors: Vec<String>, processing_time_ms: u64) -> Self {
        Self {
            contact_id,
            status: EnrichmentStatus::Failed,
            email: None,
            phone: None,
            confidence: 0.0,
            verified_confidence: 0.0,
            source_provider: None,
            phone_source: None,
            providers_tried: Vec::new(),
            total_cost: 0.0,
            processing_time_ms,
            stop_reason: None,
            email_verified: false,
            phone_verified: false,
            email_verification: EmailVerification::default(),
            phone_verification: PhoneVerification::default(),
            errors,
            enriched_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let parsed: RunId = id.to_string().parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn contact_name_from_full_name() {
        let contact = Contact {
            full_name: Some("Ada  King Lovelace".into()),
            ..Default::default()
        };
        assert!(contact.has_name());
        assert_eq!(
            contact.name_parts(),
            ("Ada".to_string(), "King Lovelace".to_string())
        );
        assert_eq!(contact.display_name().as_deref(), Some("Ada  King Lovelace"));
    }

    #[test]
    fn contact_without_name() {
        let contact = Contact {
            full_name: Some("   ".into()),
            company: Some("Acme".into()),
            ..Default::default()
        };
        assert!(!contact.has_name());
        assert!(contact.display_name().is_none());
    }

    #[test]
    fn contact_domain_is_normalized() {
        let contact = Contact {
            company_domain: Some("https://WWW.Acme.io/about?x=1".into()),
            ..Contact::new("Jane", "Doe", "Acme")
        };
        assert_eq!(contact.domain().as_deref(), Some("acme.io"));

        let bare = Contact {
            company_domain: Some("  ".into()),
            ..Default::default()
        };
        assert!(bare.domain().is_none());
    }

    #[test]
    fn contact_deserializes_minimal_json() {
        let contact: Contact =
            serde_json::from_str(r#"{"full_name":"Grace Hopper","company":"Navy"}"#)
                .expect("deserialize");
        assert_eq!(contact.company_name(), Some("Navy"));
        assert!(contact.first_name.is_empty());
        assert_eq!(contact.name_parts().1, "Hopper");
    }

    #[test]
    fn native_confidence_serialization() {
        let json = serde_json::to_string(&NativeConfidence::Label("verified".into())).unwrap();
        assert_eq!(json, r#"{"kind":"label","value":"verified"}"#);

        let json = serde_json::to_string(&NativeConfidence::Absent).unwrap();
        assert_eq!(json, r#"{"kind":"absent"}"#);
    }

    #[test]
    fn failed_outcome_has_no_data() {
        let outcome = ProviderOutcome::failed("hunter", ProviderErrorKind::Timeout, "deadline");
        assert!(!outcome.succeeded);
        assert!(!outcome.has_contact_data());
        assert_eq!(outcome.error_kind, Some(ProviderErrorKind::Timeout));

        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains(r#""error_kind":"timeout""#));
        assert!(!json.contains(r#""email""#));
    }

    #[test]
    fn failed_result_serializes_null_email() {
        let result = EnrichmentResult::failed(Some("c-1".into()), vec!["boom".into()], 12);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "failed");
        assert!(value["email"].is_null());
        assert!(value["phone"].is_null());
        assert_eq!(value["errors"][0], "boom");
        assert_eq!(value["email_verification"]["reason"], "not_checked");
    }
}

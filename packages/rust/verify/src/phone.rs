//! Phone number parsing and line-type classification.
//!
//! Numbering-plan data comes from the `phonenumber` crate. Carriers come from
//! a configured prefix table, since carrier metadata is not bundled.

use std::str::FromStr;

use phonenumber::country::Id;
use phonenumber::metadata::DATABASE;
use phonenumber::{Mode, PhoneNumber, Type};
use tracing::debug;

use leadcascade_shared::{
    CarrierPrefix, Contact, LineType, PhoneReason, PhoneVerification, PhoneVerificationConfig,
};

const SCORE_MOBILE: u8 = 100;
const SCORE_LANDLINE: u8 = 70;
const SCORE_UNKNOWN: u8 = 50;
const SCORE_VOIP: u8 = 40;

/// Two-letter TLDs mostly used generically, not as a country signal.
const GENERIC_CCTLDS: &[&str] = &["ai", "cc", "co", "fm", "gg", "io", "ly", "me", "so", "to", "tv", "ws"];

#[derive(Debug, Clone)]
pub struct PhoneVerifier {
    default_country: String,
    /// Sorted longest prefix first.
    carriers: Vec<CarrierPrefix>,
    verified_min_score: u8,
}

impl PhoneVerifier {
    pub fn new(config: &PhoneVerificationConfig) -> Self {
        let mut carriers: Vec<CarrierPrefix> = config
            .carriers
            .iter()
            .map(|c| CarrierPrefix {
                prefix: c.prefix.trim().trim_start_matches('+').to_string(),
                name: c.name.clone(),
            })
            .filter(|c| !c.prefix.is_empty())
            .collect();
        carriers.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        Self {
            default_country: config.default_country.trim().to_uppercase(),
            carriers,
            verified_min_score: config.verified_min_score,
        }
    }

    /// Region to parse national-format numbers with: the contact's declared
    /// country, else its domain's ccTLD, else the configured default.
    pub fn country_hint(&self, contact: &Contact) -> String {
        contact
            .country
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| region(c).is_some())
            .or_else(|| contact.domain().as_deref().and_then(cctld_region))
            .unwrap_or_else(|| self.default_country.clone())
    }

    pub fn is_verified(&self, verification: &PhoneVerification) -> bool {
        verification.is_valid && verification.score >= self.verified_min_score
    }

    /// Parse and classify one number.
    pub fn verify(&self, raw: &str, country_hint: Option<&str>) -> PhoneVerification {
        let hint = country_hint
            .and_then(region)
            .or_else(|| region(&self.default_country));

        let number = match parse(raw, hint) {
            Some(number) => number,
            None => {
                debug!(phone = raw, "unparseable phone number");
                return PhoneVerification {
                    reason: PhoneReason::Unparseable,
                    ..Default::default()
                };
            }
        };

        let e164 = number.format().mode(Mode::E164).to_string();
        let mut v = PhoneVerification {
            country: number.country().id().map(|id| format!("{id:?}")),
            formatted_international: Some(number.format().mode(Mode::International).to_string()),
            carrier: self.carrier_for(&e164),
            e164: Some(e164),
            ..Default::default()
        };

        if !phonenumber::is_valid(&number) {
            v.reason = PhoneReason::InvalidNumber;
            debug!(phone = raw, "phone number fails numbering plan");
            return v;
        }

        let line_type = classify(number.number_type(&DATABASE));
        let (score, reason) = match line_type {
            LineType::Mobile => (SCORE_MOBILE, PhoneReason::Valid),
            LineType::Landline => (SCORE_LANDLINE, PhoneReason::Valid),
            LineType::Voip => (SCORE_VOIP, PhoneReason::VoipNumber),
            LineType::Unknown => (SCORE_UNKNOWN, PhoneReason::UnknownLineType),
        };
        v.is_valid = true;
        v.line_type = Some(line_type);
        v.score = score;
        v.reason = reason;

        debug!(phone = raw, ?line_type, score, "phone verified");
        v
    }

    fn carrier_for(&self, e164: &str) -> Option<String> {
        let digits = e164.trim_start_matches('+');
        self.carriers
            .iter()
            .find(|c| digits.starts_with(&c.prefix))
            .map(|c| c.name.clone())
    }
}

fn parse(raw: &str, hint: Option<Id>) -> Option<PhoneNumber> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    phonenumber::parse(hint, raw).ok()
}

/// Validated region id for an ISO-3166 alpha-2 code.
fn region(code: &str) -> Option<Id> {
    Id::from_str(code.trim().to_uppercase().as_str()).ok()
}

/// Region implied by a domain's country-code TLD.
fn cctld_region(domain: &str) -> Option<String> {
    let tld = domain.rsplit('.').next()?.to_lowercase();
    if tld.len() != 2 || GENERIC_CCTLDS.iter().any(|g| *g == tld) {
        return None;
    }
    let code = match tld.as_str() {
        "uk" => "GB".to_string(),
        other => other.to_uppercase(),
    };
    region(&code).map(|_| code)
}

/// Plans where fixed-line and mobile ranges overlap (NANP) report
/// `FixedLineOrMobile`, which is classified as mobile.
fn classify(kind: Type) -> LineType {
    match kind {
        Type::Mobile | Type::FixedLineOrMobile | Type::Pager => LineType::Mobile,
        Type::FixedLine => LineType::Landline,
        Type::Voip => LineType::Voip,
        _ => LineType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> PhoneVerifier {
        PhoneVerifier::new(&PhoneVerificationConfig::default())
    }

    #[test]
    fn us_number_with_country_hint() {
        let v = verifier().verify("+1-202-555-0123", Some("US"));
        assert!(v.is_valid);
        assert!(matches!(v.line_type, Some(LineType::Mobile) | Some(LineType::Landline)));
        assert!(v.formatted_international.as_deref().unwrap().starts_with("+1"));
        assert_eq!(v.e164.as_deref(), Some("+12025550123"));
        assert_eq!(v.country.as_deref(), Some("US"));
        assert!(v.score >= 70);
    }

    #[test]
    fn national_format_uses_hint() {
        let v = verifier().verify("020 7946 0018", Some("GB"));
        assert!(v.is_valid);
        assert_eq!(v.line_type, Some(LineType::Landline));
        assert_eq!(v.score, 70);
        assert_eq!(v.country.as_deref(), Some("GB"));
        assert_eq!(v.e164.as_deref(), Some("+442079460018"));
    }

    #[test]
    fn uk_mobile_scores_full() {
        let v = verifier().verify("+44 7400 123456", None);
        assert_eq!(v.line_type, Some(LineType::Mobile));
        assert_eq!((v.score, v.reason), (100, PhoneReason::Valid));
    }

    #[test]
    fn garbage_is_unparseable_with_null_fields() {
        for raw in ["", "   ", "--"] {
            let v = verifier().verify(raw, Some("US"));
            assert!(!v.is_valid);
            assert_eq!(v.reason, PhoneReason::Unparseable);
            assert_eq!(v.score, 0);
            assert!(v.line_type.is_none());
            assert!(v.country.is_none());
            assert!(v.carrier.is_none());
            assert!(v.formatted_international.is_none());
        }
    }

    #[test]
    fn parseable_but_invalid() {
        let v = verifier().verify("+1 123 456 7890", None);
        assert!(!v.is_valid);
        assert_eq!(v.reason, PhoneReason::InvalidNumber);
        assert_eq!(v.score, 0);
        assert!(!verifier().is_verified(&v));
    }

    #[test]
    fn carrier_longest_prefix_wins() {
        let config = PhoneVerificationConfig {
            carriers: vec![
                CarrierPrefix {
                    prefix: "44".into(),
                    name: "Generic UK".into(),
                },
                CarrierPrefix {
                    prefix: "+44740".into(),
                    name: "Example Mobile".into(),
                },
            ],
            ..Default::default()
        };
        let v = PhoneVerifier::new(&config).verify("+44 7400 123456", None);
        assert_eq!(v.carrier.as_deref(), Some("Example Mobile"));
        let v = PhoneVerifier::new(&config).verify("+44 20 7946 0018", None);
        assert_eq!(v.carrier.as_deref(), Some("Generic UK"));
    }

    #[test]
    fn hint_prefers_declared_then_cctld_then_default() {
        let verifier = verifier();
        let mut contact = Contact {
            company_domain: Some("https://www.acme.co.uk/about".into()),
            ..Contact::new("Jane", "Doe", "Acme")
        };
        assert_eq!(verifier.country_hint(&contact), "GB");

        contact.country = Some("de".into());
        assert_eq!(verifier.country_hint(&contact), "DE");

        contact.country = Some("nowhere".into());
        contact.company_domain = Some("acme.io".into());
        assert_eq!(verifier.country_hint(&contact), "US");
    }

    #[test]
    fn verified_threshold() {
        let verifier = verifier();
        let unknown = PhoneVerification {
            is_valid: true,
            score: 50,
            ..Default::default()
        };
        let voip = PhoneVerification {
            is_valid: true,
            score: 40,
            ..Default::default()
        };
        assert!(verifier.is_verified(&unknown));
        assert!(!verifier.is_verified(&voip));
    }
}

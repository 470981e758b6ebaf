//! Application configuration for LeadCascade.
//!
//! User config lives at `~/.leadcascade/leadcascade.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file; each provider names the
//! environment variable that holds its key.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LeadCascadeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "leadcascade.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".leadcascade";

// ---------------------------------------------------------------------------
// Config structs (matching leadcascade.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Stop rules and verification discount.
    #[serde(default)]
    pub cascade: CascadeConfig,

    /// Batch fan-out settings.
    #[serde(default)]
    pub batch: BatchConfig,

    /// Retry/backoff policy applied to every provider call.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Rate limiter settings shared by all providers.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Email and phone verification.
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Providers, in declaration order.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cascade: CascadeConfig::default(),
            batch: BatchConfig::default(),
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            verification: VerificationConfig::default(),
            providers: default_providers(),
        }
    }
}

/// `[cascade]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Canonical confidence at which the cascade stops early.
    #[serde(default = "default_high_confidence")]
    pub high_confidence_threshold: f64,

    /// Canonical confidence treated as already excellent (no verification discount).
    #[serde(default = "default_excellent_confidence")]
    pub excellent_confidence_threshold: f64,

    /// Upper bound on providers invoked per contact.
    #[serde(default = "default_max_providers")]
    pub max_providers_per_contact: usize,

    /// Multiplier applied to confidence for each found field that fails verification.
    #[serde(default = "default_unverified_discount")]
    pub unverified_discount: f64,

    /// Run the email verifier on the selected email.
    #[serde(default = "default_true")]
    pub verify_email: bool,

    /// Run the phone verifier on the selected phone.
    #[serde(default = "default_true")]
    pub verify_phone: bool,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            high_confidence_threshold: default_high_confidence(),
            excellent_confidence_threshold: default_excellent_confidence(),
            max_providers_per_contact: default_max_providers(),
            unverified_discount: default_unverified_discount(),
            verify_email: true,
            verify_phone: true,
        }
    }
}

fn default_high_confidence() -> f64 {
    0.80
}
fn default_excellent_confidence() -> f64 {
    0.90
}
fn default_max_providers() -> usize {
    5
}
fn default_unverified_discount() -> f64 {
    0.8
}
fn default_true() -> bool {
    true
}

/// `[batch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum contacts in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    8
}

/// Jitter applied on top of the exponential backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterMode {
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// Uniform in `[0, jitter_max_ms]`, added to the delay.
    UpTo,
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts for timeouts (first call included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Extra attempts after a rate-limit rejection.
    #[serde(default = "default_rate_limit_retries")]
    pub rate_limit_retries: u32,

    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_jitter")]
    pub jitter: JitterMode,

    /// Only used with `jitter = "up_to"`.
    #[serde(default = "default_jitter_max")]
    pub jitter_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            rate_limit_retries: default_rate_limit_retries(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            jitter: default_jitter(),
            jitter_max_ms: default_jitter_max(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_rate_limit_retries() -> u32 {
    1
}
fn default_base_delay() -> u64 {
    250
}
fn default_max_delay() -> u64 {
    5_000
}
fn default_jitter() -> JitterMode {
    JitterMode::Full
}
fn default_jitter_max() -> u64 {
    100
}

/// `[rate_limit]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Longest a call may wait for a token before failing as rate limited.
    #[serde(default = "default_max_wait")]
    pub max_wait_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: default_max_wait(),
        }
    }
}

fn default_max_wait() -> u64 {
    30_000
}

/// `[verification]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationConfig {
    #[serde(default)]
    pub email: EmailVerificationConfig,
    #[serde(default)]
    pub phone: PhoneVerificationConfig,
}

/// `[verification.email]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailVerificationConfig {
    /// Open SMTP sessions to MX hosts. Many networks block outbound port 25.
    #[serde(default = "default_true")]
    pub smtp_enabled: bool,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Name announced in `HELO`/`EHLO`.
    #[serde(default = "default_helo_name")]
    pub helo_name: String,

    /// Envelope sender used for `MAIL FROM`.
    #[serde(default = "default_mail_from")]
    pub mail_from: String,

    #[serde(default = "default_smtp_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Timeout for each SMTP command round-trip.
    #[serde(default = "default_smtp_command_timeout")]
    pub command_timeout_ms: u64,

    #[serde(default = "default_dns_timeout")]
    pub dns_timeout_ms: u64,

    /// Added to the built-in disposable domain list.
    #[serde(default)]
    pub extra_disposable_domains: Vec<String>,

    /// Added to the built-in role-based local-part list.
    #[serde(default)]
    pub extra_role_prefixes: Vec<String>,

    /// Minimum score for `email_verified`.
    #[serde(default = "default_email_verified_min")]
    pub verified_min_score: u8,
}

impl Default for EmailVerificationConfig {
    fn default() -> Self {
        Self {
            smtp_enabled: true,
            smtp_port: default_smtp_port(),
            helo_name: default_helo_name(),
            mail_from: default_mail_from(),
            connect_timeout_ms: default_smtp_connect_timeout(),
            command_timeout_ms: default_smtp_command_timeout(),
            dns_timeout_ms: default_dns_timeout(),
            extra_disposable_domains: Vec::new(),
            extra_role_prefixes: Vec::new(),
            verified_min_score: default_email_verified_min(),
        }
    }
}

fn default_smtp_port() -> u16 {
    25
}
fn default_helo_name() -> String {
    "leadcascade.local".into()
}
fn default_mail_from() -> String {
    "verify@leadcascade.local".into()
}
fn default_smtp_connect_timeout() -> u64 {
    5_000
}
fn default_smtp_command_timeout() -> u64 {
    5_000
}
fn default_dns_timeout() -> u64 {
    3_000
}
fn default_email_verified_min() -> u8 {
    80
}

/// One `[[verification.phone.carriers]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierPrefix {
    /// E.164 digits without the `+`, e.g. `"4477"`.
    pub prefix: String,
    pub name: String,
}

/// `[verification.phone]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneVerificationConfig {
    /// Region used when neither the contact nor its domain gives one.
    #[serde(default = "default_country")]
    pub default_country: String,

    #[serde(default)]
    pub carriers: Vec<CarrierPrefix>,

    /// Minimum score for `phone_verified`.
    #[serde(default = "default_phone_verified_min")]
    pub verified_min_score: u8,
}

impl Default for PhoneVerificationConfig {
    fn default() -> Self {
        Self {
            default_country: default_country(),
            carriers: Vec::new(),
            verified_min_score: default_phone_verified_min(),
        }
    }
}

fn default_country() -> String {
    "US".into()
}
fn default_phone_verified_min() -> u8 {
    50
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Vendor dialect spoken by a provider entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Hunter,
    Apollo,
    PeopleDataLabs,
    Lusha,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hunter => "hunter",
            Self::Apollo => "apollo",
            Self::PeopleDataLabs => "peopledatalabs",
            Self::Lusha => "lusha",
        }
    }
}

/// Requests allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub requests: u32,
    pub window_ms: u64,
}

/// Per-provider override of the confidence calibration table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Divisor turning a numeric vendor score into 0–1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability_scale: Option<f64>,

    /// Canonical score per categorical label (case-insensitive).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, f64>,

    /// Canonical score for a bare "found".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found: Option<f64>,

    /// Trust multiplier applied after mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// `[[providers]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider name used in outcomes and statistics.
    pub name: String,

    pub kind: ProviderKind,

    /// Env var holding the API key. Defaults to `<NAME>_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Override of the vendor's API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    pub cost_per_request: f64,

    pub rate_limit: RateLimit,

    /// Explicit cascade position; lower runs first. Unranked providers follow, cheapest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_rank: Option<u32>,

    #[serde(default = "default_provider_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Charge the request when the vendor returns a malformed payload.
    #[serde(default = "default_true")]
    pub bill_invalid_responses: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationConfig>,
}

fn default_provider_timeout() -> u64 {
    10_000
}

impl ProviderConfig {
    /// A provider entry with default timeout and billing policy.
    pub fn new(name: &str, kind: ProviderKind, cost_per_request: f64, rate_limit: RateLimit) -> Self {
        Self {
            name: name.into(),
            kind,
            api_key_env: None,
            base_url: None,
            cost_per_request,
            rate_limit,
            priority_rank: None,
            timeout_ms: default_provider_timeout(),
            enabled: true,
            bill_invalid_responses: true,
            calibration: None,
        }
    }

    /// Name of the env var holding this provider's API key.
    pub fn api_key_var(&self) -> String {
        self.api_key_env.clone().unwrap_or_else(|| {
            let upper: String = self
                .name
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
                .collect();
            format!("{upper}_API_KEY")
        })
    }

    /// Read the API key from the environment. Empty values count as missing.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(self.api_key_var())
            .ok()
            .filter(|v| !v.trim().is_empty())
    }
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new(
            "hunter",
            ProviderKind::Hunter,
            0.01,
            RateLimit {
                requests: 15,
                window_ms: 1_000,
            },
        ),
        ProviderConfig::new(
            "apollo",
            ProviderKind::Apollo,
            0.02,
            RateLimit {
                requests: 50,
                window_ms: 60_000,
            },
        ),
        ProviderConfig::new(
            "peopledatalabs",
            ProviderKind::PeopleDataLabs,
            0.05,
            RateLimit {
                requests: 100,
                window_ms: 60_000,
            },
        ),
        ProviderConfig::new(
            "lusha",
            ProviderKind::Lusha,
            0.10,
            RateLimit {
                requests: 25,
                window_ms: 1_000,
            },
        ),
    ]
}

impl AppConfig {
    /// Enabled providers in cascade order.
    ///
    /// Ranked providers come first (ascending rank), then unranked ones by
    /// ascending cost. The sort is stable, so ties keep declaration order.
    pub fn ordered_providers(&self) -> Vec<ProviderConfig> {
        let mut providers: Vec<ProviderConfig> =
            self.providers.iter().filter(|p| p.enabled).cloned().collect();
        providers.sort_by(|a, b| {
            let rank_a = a.priority_rank.unwrap_or(u32::MAX);
            let rank_b = b.priority_rank.unwrap_or(u32::MAX);
            rank_a
                .cmp(&rank_b)
                .then(a.cost_per_request.total_cmp(&b.cost_per_request))
        });
        providers
    }

    /// Check thresholds, limits and provider entries for consistency.
    pub fn validate(&self) -> Result<()> {
        let c = &self.cascade;
        if !(0.0..=1.0).contains(&c.high_confidence_threshold)
            || !(0.0..=1.0).contains(&c.excellent_confidence_threshold)
        {
            return Err(LeadCascadeError::config(
                "confidence thresholds must be within [0, 1]",
            ));
        }
        if c.excellent_confidence_threshold < c.high_confidence_threshold {
            return Err(LeadCascadeError::config(
                "excellent_confidence_threshold must be >= high_confidence_threshold",
            ));
        }
        if c.max_providers_per_contact == 0 {
            return Err(LeadCascadeError::config(
                "max_providers_per_contact must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&c.unverified_discount) {
            return Err(LeadCascadeError::config(
                "unverified_discount must be within [0, 1]",
            ));
        }
        if self.batch.concurrency == 0 {
            return Err(LeadCascadeError::config("batch concurrency must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(LeadCascadeError::config("retry max_attempts must be at least 1"));
        }

        let mut seen = HashSet::new();
        for p in &self.providers {
            if !seen.insert(p.name.as_str()) {
                return Err(LeadCascadeError::config(format!(
                    "duplicate provider name '{}'",
                    p.name
                )));
            }
            if p.cost_per_request.is_nan() || p.cost_per_request < 0.0 {
                return Err(LeadCascadeError::config(format!(
                    "provider '{}' has a negative or invalid cost",
                    p.name
                )));
            }
            if p.rate_limit.requests == 0 || p.rate_limit.window_ms == 0 {
                return Err(LeadCascadeError::config(format!(
                    "provider '{}' rate_limit needs requests >= 1 and window_ms >= 1",
                    p.name
                )));
            }
            if let Some(base) = &p.base_url {
                url::Url::parse(base).map_err(|e| {
                    LeadCascadeError::config(format!(
                        "provider '{}' has an invalid base_url '{base}': {e}",
                        p.name
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Names of enabled providers whose API key env var is unset.
    pub fn missing_api_keys(&self) -> Vec<String> {
        self.providers
            .iter()
            .filter(|p| p.enabled && p.api_key().is_none())
            .map(|p| p.name.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.leadcascade/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LeadCascadeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.leadcascade/leadcascade.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LeadCascadeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        LeadCascadeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LeadCascadeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LeadCascadeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LeadCascadeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("high_confidence_threshold"));
        assert!(toml_str.contains("[[providers]]"));
        assert!(toml_str.contains("peopledatalabs"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.cascade.max_providers_per_contact, 5);
        assert_eq!(parsed.providers.len(), 4);
        assert_eq!(parsed.retry.jitter, JitterMode::Full);
        parsed.validate().expect("defaults are valid");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[cascade]
high_confidence_threshold = 0.75

[[providers]]
name = "cheap"
kind = "hunter"
cost_per_request = 0.005
rate_limit = { requests = 5, window_ms = 1000 }
base_url = "http://127.0.0.1:9000"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.cascade.high_confidence_threshold, 0.75);
        assert_eq!(config.cascade.excellent_confidence_threshold, 0.90);
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].timeout_ms, 10_000);
        assert!(config.providers[0].bill_invalid_responses);
        assert_eq!(config.batch.concurrency, 8);
        config.validate().expect("valid");
    }

    #[test]
    fn cascade_order_by_cost_then_rank() {
        let mut config = AppConfig::default();
        let order: Vec<String> = config.ordered_providers().into_iter().map(|p| p.name).collect();
        assert_eq!(order, ["hunter", "apollo", "peopledatalabs", "lusha"]);

        config.providers[3].priority_rank = Some(1);
        config.providers[1].enabled = false;
        let order: Vec<String> = config.ordered_providers().into_iter().map(|p| p.name).collect();
        assert_eq!(order, ["lusha", "hunter", "peopledatalabs"]);
    }

    #[test]
    fn equal_cost_keeps_declaration_order() {
        let mut config = AppConfig::default();
        for p in &mut config.providers {
            p.cost_per_request = 0.01;
        }
        let order: Vec<String> = config.ordered_providers().into_iter().map(|p| p.name).collect();
        assert_eq!(order, ["hunter", "apollo", "peopledatalabs", "lusha"]);
    }

    #[test]
    fn validation_rejects_bad_thresholds() {
        let mut config = AppConfig::default();
        config.cascade.excellent_confidence_threshold = 0.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("excellent_confidence_threshold"));

        let mut config = AppConfig::default();
        config.batch.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_duplicate_providers() {
        let mut config = AppConfig::default();
        let dup = config.providers[0].clone();
        config.providers.push(dup);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate provider"));
    }

    #[test]
    fn api_key_var_defaults_from_name() {
        let mut p = ProviderConfig::new(
            "people-data",
            ProviderKind::PeopleDataLabs,
            0.1,
            RateLimit {
                requests: 1,
                window_ms: 1000,
            },
        );
        assert_eq!(p.api_key_var(), "PEOPLE_DATA_API_KEY");

        // Use a unique env var name to avoid interfering with other tests
        p.api_key_env = Some("LC_TEST_NONEXISTENT_KEY_12345".into());
        assert!(p.api_key().is_none());
    }
}

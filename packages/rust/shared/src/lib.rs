//! Shared types, error model, and configuration for LeadCascade.
//!
//! This crate is the foundation depended on by all other LeadCascade crates.
//! It provides:
//! - [`LeadCascadeError`] — the unified error type
//! - Domain types ([`Contact`], [`ProviderOutcome`], [`EnrichmentResult`], verification details)
//! - Configuration ([`AppConfig`], [`ProviderConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BatchConfig, CalibrationConfig, CarrierPrefix, CascadeConfig,
    EmailVerificationConfig, JitterMode, PhoneVerificationConfig, ProviderConfig, ProviderKind,
    RateLimit, RateLimitConfig, RetryConfig, VerificationConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{LeadCascadeError, Result};
pub use types::{
    Contact, EmailReason, EmailVerification, EnrichmentResult, EnrichmentStatus, LineType,
    NativeConfidence, PhoneReason, PhoneVerification, ProviderErrorKind, ProviderOutcome, RunId,
    StopReason,
};

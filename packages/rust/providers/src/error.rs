//! Provider call failures.
//!
//! These never escape the engine: the pool folds them into
//! [`ProviderOutcome`](leadcascade_shared::ProviderOutcome) fields.

use leadcascade_shared::ProviderErrorKind;

/// Failure of a single provider attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Credentials rejected. Disables the provider for the rest of the run.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Vendor returned 429, or the local token wait exceeded its ceiling.
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("timed out: {0}")]
    Timeout(String),

    /// Payload could not be decoded. Treated as "no match".
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Connection failure or unexpected HTTP status.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Auth(_) => ProviderErrorKind::Auth,
            Self::RateLimited(_) => ProviderErrorKind::RateLimited,
            Self::Timeout(_) => ProviderErrorKind::Timeout,
            Self::InvalidResponse(_) => ProviderErrorKind::InvalidResponse,
            Self::Unavailable(_) => ProviderErrorKind::Unavailable,
        }
    }
}

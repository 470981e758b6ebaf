//! Infrastructure failures while verifying.
//!
//! These never reach the caller as errors. The email verifier turns them into
//! an inconclusive level (for SMTP) or a failed level (for DNS).

/// DNS or SMTP infrastructure failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationInfraError {
    #[error("DNS lookup failed: {0}")]
    Dns(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    /// The SMTP server sent something we could not follow.
    #[error("SMTP protocol error: {0}")]
    Protocol(String),
}

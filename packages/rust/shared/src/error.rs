//! Error types for LeadCascade.
//!
//! Library crates use [`LeadCascadeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Provider and verification failures are *not* represented here: they
//! degrade into outcome fields and never reach the batch caller. This type
//! covers the failures that are genuinely fatal to an operation.

use std::path::PathBuf;

/// Top-level error type for LeadCascade operations.
#[derive(Debug, thiserror::Error)]
pub enum LeadCascadeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while building clients or resolvers.
    #[error("network error: {0}")]
    Network(String),

    /// Batch scheduling failure (semaphore closed, task group broken).
    #[error("batch error: {0}")]
    Batch(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON (de)serialization error on an input or output document.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LeadCascadeError>;

impl LeadCascadeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

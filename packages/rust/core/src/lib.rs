//! Cascade enrichment for LeadCascade.
//!
//! This crate ties the provider pool, the confidence scorer and both
//! verifiers into per-contact cascades ([`CascadeOrchestrator`]) and
//! bounded-concurrency batches ([`BatchProcessor`]). [`Engine`] assembles
//! everything from an [`AppConfig`](leadcascade_shared::AppConfig).

pub mod batch;
pub mod cascade;
pub mod engine;
pub mod scorer;

#[cfg(test)]
mod testing;

pub use batch::{
    BatchProcessor, BatchProgress, BatchReport, BatchStats, ProviderUsage, SilentBatchProgress,
};
pub use cascade::CascadeOrchestrator;
pub use engine::{Engine, read_contacts, write_json};
pub use scorer::{Calibration, ConfidenceScorer, select_best};

//! Engine assembly and contact file I/O.
//!
//! [`Engine`] builds every collaborator from one [`AppConfig`]: the provider
//! pool, calibration tables, both verifiers, the cascade and the batch
//! processor. The pool is shared by every cascade the engine runs and is
//! reset at the start of each batch.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use leadcascade_providers::ProviderPool;
use leadcascade_shared::{
    AppConfig, Contact, EnrichmentResult, LeadCascadeError, Result,
};
use leadcascade_verify::{EmailVerifier, PhoneVerifier};

use crate::batch::{BatchProcessor, BatchProgress, BatchReport};
use crate::cascade::CascadeOrchestrator;
use crate::scorer::ConfidenceScorer;

/// A configured enrichment engine.
#[derive(Debug, Clone)]
pub struct Engine {
    cascade: Arc<CascadeOrchestrator>,
    batch: BatchProcessor,
}

impl Engine {
    /// Validate the config and build every component.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let pool = Arc::new(ProviderPool::from_config(config)?);
        let scorer = ConfidenceScorer::from_providers(&config.ordered_providers());
        let email = Arc::new(EmailVerifier::from_config(&config.verification.email));
        let phone = PhoneVerifier::new(&config.verification.phone);

        info!(
            providers = ?pool.names(),
            disabled = ?pool.disabled_providers(),
            concurrency = config.batch.concurrency,
            "engine ready"
        );

        let cascade = Arc::new(CascadeOrchestrator::new(
            config.cascade.clone(),
            pool,
            scorer,
            email,
            phone,
        ));
        let batch = BatchProcessor::new(cascade.clone(), config.batch.concurrency)?;
        Ok(Self { cascade, batch })
    }

    /// Same engine with a different batch concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self> {
        self.batch = BatchProcessor::new(self.cascade.clone(), concurrency)?;
        Ok(self)
    }

    pub fn pool(&self) -> &Arc<ProviderPool> {
        self.cascade.pool()
    }

    pub fn concurrency(&self) -> usize {
        self.batch.concurrency()
    }

    /// Enrich a single contact.
    pub async fn enrich(&self, contact: &Contact) -> EnrichmentResult {
        self.cascade.enrich(contact).await
    }

    /// Run a batch. Providers disabled by an earlier run are re-enabled first.
    pub async fn run_batch(
        &self,
        contacts: Vec<Contact>,
        cancel: CancellationToken,
        progress: &dyn BatchProgress,
    ) -> Result<BatchReport> {
        self.pool().reset();
        self.batch.run(contacts, cancel, progress).await
    }
}

// ---------------------------------------------------------------------------
// Contact files
// ---------------------------------------------------------------------------

/// Read a JSON array of contacts.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_contacts(path: &Path) -> Result<Vec<Contact>> {
    let content = std::fs::read_to_string(path).map_err(|e| LeadCascadeError::io(path, e))?;
    let contacts: Vec<Contact> = serde_json::from_str(&content).map_err(|e| {
        LeadCascadeError::Serialization(format!("invalid contacts file {}: {e}", path.display()))
    })?;
    debug!(count = contacts.len(), "read contacts");
    Ok(contacts)
}

/// Write a JSON file (pretty-printed), creating parent directories.
pub fn write_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| LeadCascadeError::Serialization(format!("JSON serialization failed: {e}")))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LeadCascadeError::io(parent, e))?;
    }
    std::fs::write(path, json).map_err(|e| LeadCascadeError::io(path, e))?;
    debug!(path = %path.display(), "wrote JSON file");
    Ok(())
}

//! Bounded-concurrency batch enrichment.
//!
//! At most `concurrency` contacts are in flight. Each contact runs in its own
//! task, so a panic while enriching one contact becomes a failed result for
//! that contact only. Cancellation stops scheduling; in-flight contacts
//! finish and the rest are reported as unscheduled.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use leadcascade_shared::{
    Contact, EnrichmentResult, EnrichmentStatus, LeadCascadeError, Result, RunId, StopReason,
};

use crate::cascade::CascadeOrchestrator;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Usage of one provider across a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub calls: u64,
    /// Calls that returned an email or a phone.
    pub matches: u64,
    pub errors: u64,
    pub cost: f64,
}

/// Aggregate statistics for a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub processed: usize,
    pub matched: usize,
    pub no_match: usize,
    pub failed: usize,
    /// `matched / processed`, 0 when nothing was processed.
    pub success_rate: f64,
    pub total_cost: f64,
    pub average_processing_time_ms: f64,
    /// Contacts whose cascade stopped on a confidence threshold.
    pub early_stops: usize,
    pub providers: BTreeMap<String, ProviderUsage>,
}

impl BatchStats {
    /// Compute statistics over processed results.
    pub fn from_results(total: usize, results: &[EnrichmentResult]) -> Self {
        let mut stats = Self {
            total,
            processed: results.len(),
            ..Self::default()
        };

        let mut time_ms: u64 = 0;
        for result in results {
            match result.status {
                EnrichmentStatus::Matched => stats.matched += 1,
                EnrichmentStatus::NoMatch => stats.no_match += 1,
                EnrichmentStatus::Failed => stats.failed += 1,
            }
            if matches!(
                result.stop_reason,
                Some(StopReason::HighConfidence | StopReason::ExcellentConfidence)
            ) {
                stats.early_stops += 1;
            }
            stats.total_cost += result.total_cost;
            time_ms += result.processing_time_ms;

            for outcome in &result.providers_tried {
                let usage = stats.providers.entry(outcome.provider_name.clone()).or_default();
                usage.calls += 1;
                usage.cost += outcome.cost;
                // Malformed payloads are no-match outcomes but still provider errors
                if outcome.error_kind.is_some() {
                    usage.errors += 1;
                } else if outcome.has_contact_data() {
                    usage.matches += 1;
                }
            }
        }

        if stats.processed > 0 {
            stats.success_rate = stats.matched as f64 / stats.processed as f64;
            stats.average_processing_time_ms = time_ms as f64 / stats.processed as f64;
        }
        stats
    }
}

/// Everything a batch run hands back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: RunId,
    /// Results for processed contacts, in input order.
    pub results: Vec<EnrichmentResult>,
    pub stats: BatchStats,
    /// Input positions never started because the run was cancelled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unscheduled: Vec<usize>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for batch runs.
pub trait BatchProgress: Send + Sync {
    /// Called once before any contact is scheduled.
    fn started(&self, total: usize);
    /// Called as each contact completes, in completion order.
    fn contact_done(&self, index: usize, result: &EnrichmentResult, completed: usize, total: usize);
    /// Called once with the final report.
    fn finished(&self, report: &BatchReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentBatchProgress;

impl BatchProgress for SilentBatchProgress {
    fn started(&self, _total: usize) {}
    fn contact_done(&self, _index: usize, _result: &EnrichmentResult, _completed: usize, _total: usize) {}
    fn finished(&self, _report: &BatchReport) {}
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Fans contacts out over a shared [`CascadeOrchestrator`].
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    cascade: Arc<CascadeOrchestrator>,
    concurrency: usize,
}

impl BatchProcessor {
    /// Fails when `concurrency` is zero.
    pub fn new(cascade: Arc<CascadeOrchestrator>, concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(LeadCascadeError::Batch(
                "concurrency must be at least 1".into(),
            ));
        }
        Ok(Self {
            cascade,
            concurrency,
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Enrich every contact, at most `concurrency` at a time.
    #[instrument(skip_all, fields(contacts = contacts.len(), concurrency = self.concurrency))]
    pub async fn run(
        &self,
        contacts: Vec<Contact>,
        cancel: CancellationToken,
        progress: &dyn BatchProgress,
    ) -> Result<BatchReport> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let clock = Instant::now();
        let total = contacts.len();

        info!(%run_id, total, "starting batch");
        progress.started(total);

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<(usize, EnrichmentResult)> = JoinSet::new();
        let mut slots: Vec<Option<EnrichmentResult>> = vec![None; total];
        let mut scheduled = 0;
        let mut completed = 0;
        let mut cancelled = false;

        for (index, contact) in contacts.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => Some(
                    permit.map_err(|e| LeadCascadeError::Batch(format!("semaphore closed: {e}")))?,
                ),
            };
            let Some(permit) = permit else {
                cancelled = true;
                break;
            };

            let cascade = self.cascade.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let contact_id = contact.id.clone();
                let started = Instant::now();
                // Inner task so a panic surfaces here as a JoinError
                let result = match tokio::spawn(async move { cascade.enrich(&contact).await }).await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(index, error = %e, "contact task crashed");
                        EnrichmentResult::failed(
                            contact_id,
                            vec![format!("enrichment task failed: {e}")],
                            started.elapsed().as_millis() as u64,
                        )
                    }
                };
                (index, result)
            });
            scheduled += 1;

            while let Some(joined) = tasks.try_join_next() {
                completed += record(joined, &mut slots, progress, completed, total);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            completed += record(joined, &mut slots, progress, completed, total);
        }

        let unscheduled: Vec<usize> = (scheduled..total).collect();
        if cancelled {
            warn!(%run_id, unscheduled = unscheduled.len(), "batch cancelled");
        }

        let results: Vec<EnrichmentResult> = slots
            .into_iter()
            .take(scheduled)
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    EnrichmentResult::failed(None, vec!["enrichment task aborted".into()], 0)
                })
            })
            .collect();

        let stats = BatchStats::from_results(total, &results);
        let report = BatchReport {
            run_id,
            results,
            stats,
            unscheduled,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            run_id = %report.run_id,
            processed = report.stats.processed,
            matched = report.stats.matched,
            failed = report.stats.failed,
            cost = report.stats.total_cost,
            elapsed_ms = clock.elapsed().as_millis() as u64,
            "batch complete"
        );
        progress.finished(&report);
        Ok(report)
    }
}

/// Store one joined task's result. Returns 1 if a result was stored.
fn record(
    joined: std::result::Result<(usize, EnrichmentResult), tokio::task::JoinError>,
    slots: &mut [Option<EnrichmentResult>],
    progress: &dyn BatchProgress,
    completed: usize,
    total: usize,
) -> usize {
    match joined {
        Ok((index, result)) => {
            progress.contact_done(index, &result, completed + 1, total);
            slots[index] = Some(result);
            1
        }
        Err(e) => {
            error!(error = %e, "batch task failed");
            0
        }
    }
}

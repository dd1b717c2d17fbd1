//! # Sync Driver
//!
//! Orchestrates one run: iterate units, skip checkpointed and ineligible
//! ones, stage eligible upserts, flush at the batch threshold and at end of
//! stream, and reconcile each flush against the checkpoint set and failure
//! log.
//!
//! Only confirmed successes enter the checkpoint, so failed and skipped
//! units are naturally re-attempted (or re-evaluated) on the next run.
//! The checkpoint is persisted immediately after every flush that grows it,
//! never deferred to end of run.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::checkpoint::{CheckpointSet, FailureLog};
use crate::error::BackfillResult;
use crate::models::UnitOutcome;
use crate::source::RowSource;
use crate::store::DocumentStore;
use crate::submit::{BatchSubmitter, FlushReason};
use crate::transform::Transformer;

/// Final accounting for one run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Units seen in the source, including skipped ones
    pub discovered: usize,
    /// Units staged for upsert
    pub staged: usize,
    /// Ids confirmed written this run
    pub succeeded: usize,
    /// Ids recorded in the failure log this run
    pub failed: usize,
    /// Units skipped (already checkpointed or not eligible)
    pub skipped: usize,
    /// Checkpoint set size after the run
    pub checkpoint_size: usize,
    /// Where operators can inspect failures
    pub failure_log_path: PathBuf,
    pub elapsed: Duration,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "discovered={} staged={} succeeded={} failed={} skipped={} \
             checkpoint_size={} failure_log={} elapsed={:.1}s",
            self.discovered,
            self.staged,
            self.succeeded,
            self.failed,
            self.skipped,
            self.checkpoint_size,
            self.failure_log_path.display(),
            self.elapsed.as_secs_f64(),
        )
    }
}

#[derive(Debug, Default)]
struct Counters {
    discovered: usize,
    staged: usize,
    skipped: usize,
    succeeded: usize,
    failed: usize,
}

/// Single-threaded state machine over one backfill run
pub struct SyncDriver<R: RowSource, S: DocumentStore> {
    source: R,
    transformer: Transformer,
    submitter: BatchSubmitter<S>,
    checkpoint: CheckpointSet,
    failure_log: FailureLog,
    batch_threshold: usize,
    max_units: Option<usize>,
}

impl<R: RowSource, S: DocumentStore> SyncDriver<R, S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: R,
        transformer: Transformer,
        submitter: BatchSubmitter<S>,
        checkpoint: CheckpointSet,
        failure_log: FailureLog,
        batch_threshold: usize,
        max_units: Option<usize>,
    ) -> Self {
        Self {
            source,
            transformer,
            submitter,
            checkpoint,
            failure_log,
            batch_threshold,
            max_units,
        }
    }

    /// Execute the run to completion
    pub async fn run(mut self) -> BackfillResult<RunSummary> {
        let started = Instant::now();
        let mut counters = Counters::default();

        info!(
            checkpointed = self.checkpoint.len(),
            batch_threshold = self.batch_threshold,
            max_units = self.max_units,
            "Starting backfill run"
        );

        match self.iterate(&mut counters).await {
            Ok(()) => {
                self.flush_and_reconcile(FlushReason::Final, &mut counters)
                    .await?;
            }
            Err(e) => {
                // Fatal source error: flush whatever is staged best-effort,
                // then surface the original error.
                error!(error = %e, "Fatal error during unit iteration");
                if !self.submitter.is_empty() {
                    if let Err(flush_err) = self
                        .flush_and_reconcile(FlushReason::Final, &mut counters)
                        .await
                    {
                        warn!(error = %flush_err, "Best-effort final flush failed during abort");
                    }
                }
                return Err(e);
            }
        }

        let summary = RunSummary {
            discovered: counters.discovered,
            staged: counters.staged,
            succeeded: counters.succeeded,
            failed: counters.failed,
            skipped: counters.skipped,
            checkpoint_size: self.checkpoint.len(),
            failure_log_path: self.failure_log.path().to_path_buf(),
            elapsed: started.elapsed(),
        };

        info!(summary = %summary, "Backfill run complete");
        Ok(summary)
    }

    async fn iterate(&mut self, counters: &mut Counters) -> BackfillResult<()> {
        while let Some(unit) = self.source.next_unit().await? {
            counters.discovered += 1;

            if self.checkpoint.contains(&unit.evaluation_id) {
                counters.skipped += 1;
                debug!(id = %unit.evaluation_id, "Skipping already-checkpointed unit");
                continue;
            }

            match self.transformer.evaluate(&unit) {
                UnitOutcome::Skipped(reason) => {
                    counters.skipped += 1;
                    debug!(id = %unit.evaluation_id, reason = %reason, "Skipping ineligible unit");
                }
                UnitOutcome::Eligible(target) => {
                    self.submitter.enqueue(target);
                    counters.staged += 1;

                    if self.submitter.len() >= self.batch_threshold {
                        self.flush_and_reconcile(FlushReason::Periodic, counters)
                            .await?;
                    }
                }
            }

            if let Some(cap) = self.max_units {
                if counters.staged >= cap {
                    info!(cap, "Maximum-units cap reached, stopping iteration");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Flush the submitter and fold the outcome into durable state:
    /// successes into the checkpoint set (persisted immediately if it grew),
    /// failures appended to the failure log under the flush reason tag.
    async fn flush_and_reconcile(
        &mut self,
        reason: FlushReason,
        counters: &mut Counters,
    ) -> BackfillResult<()> {
        if self.submitter.is_empty() {
            return Ok(());
        }

        let batch_size = self.submitter.len();
        let flush_started = Instant::now();
        let outcome = self.submitter.flush(reason).await;

        let grew = self.checkpoint.insert_all(outcome.succeeded.iter().cloned());
        if grew > 0 {
            self.checkpoint.persist()?;
        }

        if !outcome.failed.is_empty() {
            self.failure_log.append(
                outcome.failed.iter().map(String::as_str),
                &reason.to_string(),
            )?;
        }

        counters.succeeded += outcome.succeeded.len();
        counters.failed += outcome.failed.len();

        info!(
            reason = %reason,
            batch = batch_size,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            checkpoint_size = self.checkpoint.len(),
            elapsed_ms = flush_started.elapsed().as_millis() as u64,
            "Flushed batch"
        );

        Ok(())
    }
}

//! # Batch Submitter
//!
//! Accumulates eligible upserts and submits them as one bulk request.
//!
//! The buffer and its parallel pending-id list are owned by the submitter
//! instance, never module state, so independent submitters can coexist and
//! ownership stays explicit. Outcome matching is positional: the pending-id
//! list order exactly matches the order operations were appended to the
//! request.

use tracing::{debug, warn};

use crate::models::SyncTarget;
use crate::store::DocumentStore;

/// Why a flush was triggered; doubles as the failure-log reason tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Batch threshold reached mid-run
    Periodic,
    /// End of unit iteration (or cap reached)
    Final,
}

impl std::fmt::Display for FlushReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushReason::Periodic => write!(f, "periodic"),
            FlushReason::Final => write!(f, "final"),
        }
    }
}

/// Per-item reconciliation result of one flush
#[derive(Debug, Clone)]
pub struct FlushOutcome {
    pub reason: FlushReason,
    /// Ids confirmed written, in submission order
    pub succeeded: Vec<String>,
    /// Ids that failed (item-level or whole-request), in submission order
    pub failed: Vec<String>,
}

impl FlushOutcome {
    fn empty(reason: FlushReason) -> Self {
        Self {
            reason,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Bounded batch accumulator over a [`DocumentStore`]
pub struct BatchSubmitter<S: DocumentStore> {
    store: S,
    buffer: Vec<SyncTarget>,
    pending_ids: Vec<String>,
}

impl<S: DocumentStore> BatchSubmitter<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            buffer: Vec::new(),
            pending_ids: Vec::new(),
        }
    }

    /// Stage one upsert operation
    pub fn enqueue(&mut self, target: SyncTarget) {
        self.pending_ids.push(target.document_id.clone());
        self.buffer.push(target);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Submit everything buffered as one request and classify outcomes.
    ///
    /// The buffer is cleared regardless of the result so the run can proceed:
    /// a transport-level failure classifies every pending id as failed rather
    /// than aborting.
    pub async fn flush(&mut self, reason: FlushReason) -> FlushOutcome {
        if self.buffer.is_empty() {
            return FlushOutcome::empty(reason);
        }

        let batch = std::mem::take(&mut self.buffer);
        let pending = std::mem::take(&mut self.pending_ids);

        match self.store.bulk_upsert(&batch).await {
            Err(e) => {
                warn!(
                    reason = %reason,
                    operations = pending.len(),
                    error = %e,
                    recoverable = e.is_recoverable(),
                    "Bulk submission failed at the request level; marking whole batch failed"
                );
                FlushOutcome {
                    reason,
                    succeeded: Vec::new(),
                    failed: pending,
                }
            }
            Ok(outcomes) => {
                if outcomes.len() != pending.len() {
                    warn!(
                        expected = pending.len(),
                        received = outcomes.len(),
                        "Bulk response item count does not match submitted operations; pairing best-effort"
                    );
                }

                let mut succeeded = Vec::new();
                let mut failed = Vec::new();
                for (position, id) in pending.into_iter().enumerate() {
                    match outcomes.get(position) {
                        Some(outcome) if outcome.is_success() => {
                            if let Some(echoed) = &outcome.document_id {
                                if echoed != &id {
                                    warn!(position, pending = %id, echoed = %echoed,
                                        "Bulk response id differs from pending id at this position");
                                }
                            }
                            succeeded.push(id);
                        }
                        Some(outcome) => {
                            debug!(
                                id = %id,
                                error = outcome.error.as_deref().unwrap_or("unknown"),
                                "Item-level failure in bulk response"
                            );
                            failed.push(id);
                        }
                        // No outcome at this position: never confirm a write
                        // the store did not acknowledge.
                        None => failed.push(id),
                    }
                }

                FlushOutcome {
                    reason,
                    succeeded,
                    failed,
                }
            }
        }
    }
}

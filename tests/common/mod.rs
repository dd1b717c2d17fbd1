//! Shared test doubles: an in-memory row source and a scripted document
//! store whose state can be inspected after the driver consumes it.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use score_backfill::checkpoint::FailureRecord;
use score_backfill::error::StoreError;
use score_backfill::models::{DetailRow, SyncTarget, UnitRows};
use score_backfill::source::RowSource;
use score_backfill::store::{DocumentStore, ItemOutcome};
use score_backfill::BackfillResult;

/// Finite source over pre-grouped units
pub struct InMemorySource {
    units: VecDeque<UnitRows>,
}

impl InMemorySource {
    pub fn new(units: Vec<UnitRows>) -> Self {
        Self {
            units: units.into(),
        }
    }
}

#[async_trait]
impl RowSource for InMemorySource {
    async fn next_unit(&mut self) -> BackfillResult<Option<UnitRows>> {
        Ok(self.units.pop_front())
    }
}

#[derive(Default)]
struct MockStoreState {
    /// Ids that report an item-level error in otherwise-successful batches
    failing_ids: HashSet<String>,
    /// Number of upcoming calls that fail at the request level
    transport_failures_remaining: usize,
    /// Ids submitted per bulk call, in order
    calls: Vec<Vec<String>>,
}

/// Scripted document store; clones share state
#[derive(Clone, Default)]
pub struct MockStore {
    inner: Arc<Mutex<MockStoreState>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_ids<I: IntoIterator<Item = &'static str>>(&self, ids: I) {
        let mut state = self.inner.lock().unwrap();
        state.failing_ids = ids.into_iter().map(String::from).collect();
    }

    pub fn fail_next_requests(&self, count: usize) {
        self.inner.lock().unwrap().transport_failures_remaining = count;
    }

    pub fn call_sizes(&self) -> Vec<usize> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(Vec::len)
            .collect()
    }

}

#[async_trait]
impl DocumentStore for MockStore {
    async fn bulk_upsert(&self, targets: &[SyncTarget]) -> Result<Vec<ItemOutcome>, StoreError> {
        let mut state = self.inner.lock().unwrap();
        state
            .calls
            .push(targets.iter().map(|t| t.document_id.clone()).collect());

        if state.transport_failures_remaining > 0 {
            state.transport_failures_remaining -= 1;
            return Err(StoreError::api_error(503, "service unavailable"));
        }

        Ok(targets
            .iter()
            .map(|t| ItemOutcome {
                document_id: Some(t.document_id.clone()),
                error: state
                    .failing_ids
                    .contains(&t.document_id)
                    .then(|| "mapper_parsing_exception".to_string()),
            })
            .collect())
    }
}

/// An eligible unit: one non-empty detail, tenant resolved directly
pub fn eligible_unit(id: &str, tenant: &str) -> UnitRows {
    UnitRows {
        evaluation_id: id.to_string(),
        client_external_id: Some(tenant.to_string()),
        contact_client_external_id: None,
        rows: vec![DetailRow {
            category_id: 1,
            score: 3.5,
            justification: Some("well handled".to_string()),
            phrases: None,
            category_slug: Some("clarity".to_string()),
            category_name: Some("Clarity".to_string()),
        }],
    }
}

/// A unit whose every detail is empty after normalization
pub fn empty_details_unit(id: &str, tenant: &str) -> UnitRows {
    UnitRows {
        evaluation_id: id.to_string(),
        client_external_id: Some(tenant.to_string()),
        contact_client_external_id: None,
        rows: vec![DetailRow {
            category_id: 1,
            score: 2.0,
            justification: None,
            phrases: None,
            category_slug: None,
            category_name: None,
        }],
    }
}

/// Read the failure log back as records
pub fn read_failures(path: &std::path::Path) -> Vec<FailureRecord> {
    use std::io::BufRead;
    let Ok(file) = std::fs::File::open(path) else {
        return Vec::new();
    };
    std::io::BufReader::new(file)
        .lines()
        .map(|l| serde_json::from_str(&l.unwrap()).unwrap())
        .collect()
}

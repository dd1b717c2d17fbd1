//! # Document Store Client
//!
//! The bulk-upsert seam between the pipeline and the search cluster.
//!
//! [`DocumentStore`] is the trait the submitter drives; [`SearchStoreClient`]
//! is the HTTP implementation speaking the `_bulk` API: alternating
//! update-with-upsert action headers and document bodies, submitted with
//! `refresh=wait_for` so written documents are visible immediately after a
//! successful flush.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::SearchStoreConfig;
use crate::error::StoreError;
use crate::models::SyncTarget;

/// Outcome of one operation within a bulk request, in submission order
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    /// Document id echoed by the store, when present in the response
    pub document_id: Option<String>,
    /// Error marker for this operation, if it failed
    pub error: Option<String>,
}

impl ItemOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Bulk-upsert interface returning ordered per-item outcomes.
///
/// An `Err` means the whole submission failed (transport or request level);
/// item-level failures are reported inside the `Ok` outcome list.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn bulk_upsert(&self, targets: &[SyncTarget]) -> Result<Vec<ItemOutcome>, StoreError>;
}

/// HTTP client for the search cluster's bulk API
#[derive(Debug, Clone)]
pub struct SearchStoreClient {
    client: reqwest::Client,
    config: SearchStoreConfig,
}

impl SearchStoreClient {
    /// Build the client with the configured hour-scale request timeout
    pub fn new(config: SearchStoreConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Serialize targets into the NDJSON bulk body: one action header and one
    /// document body per operation, order preserved.
    fn bulk_body(&self, targets: &[SyncTarget]) -> Result<String, StoreError> {
        let mut body = String::new();
        for target in targets {
            let action = json!({
                "update": {
                    "_index": target.index,
                    "_id": target.document_id,
                    "retry_on_conflict": self.config.retry_on_conflict,
                    "require_alias": self.config.require_alias,
                }
            });
            let doc = json!({
                "doc": target.payload(),
                "doc_as_upsert": true,
            });
            body.push_str(&serde_json::to_string(&action)?);
            body.push('\n');
            body.push_str(&serde_json::to_string(&doc)?);
            body.push('\n');
        }
        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItemDetail>>,
}

#[derive(Debug, Deserialize)]
struct BulkItemDetail {
    #[serde(rename = "_id")]
    id: Option<String>,
    status: Option<u16>,
    error: Option<serde_json::Value>,
}

fn outcomes_from_response(response: BulkResponse) -> Vec<ItemOutcome> {
    response
        .items
        .into_iter()
        .map(|mut item| {
            // Each item is keyed by its action type ("update" here); take
            // whatever single entry the store returned.
            let detail = item.drain().next().map(|(_, d)| d);
            match detail {
                Some(d) => ItemOutcome {
                    document_id: d.id,
                    error: d.error.map(|e| {
                        format!("status {}: {e}", d.status.unwrap_or_default())
                    }),
                },
                None => ItemOutcome {
                    document_id: None,
                    error: Some("missing item detail in bulk response".to_string()),
                },
            }
        })
        .collect()
}

#[async_trait]
impl DocumentStore for SearchStoreClient {
    async fn bulk_upsert(&self, targets: &[SyncTarget]) -> Result<Vec<ItemOutcome>, StoreError> {
        let url = format!(
            "{}/_bulk?refresh=wait_for",
            self.config.base_url.trim_end_matches('/')
        );
        let body = self.bulk_body(targets)?;

        let mut request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body);

        if let Some(username) = &self.config.username {
            request = request.basic_auth(username, self.config.password.as_deref());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::api_error(status.as_u16(), message));
        }

        let parsed: BulkResponse = response
            .json()
            .await
            .map_err(|e| StoreError::MalformedResponse(e.to_string()))?;

        if parsed.errors {
            debug!(operations = targets.len(), "Bulk response reported item-level errors");
        }

        Ok(outcomes_from_response(parsed))
    }
}

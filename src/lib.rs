//! # Score Backfill
//!
//! Resumable batch backfill of evaluation score details from PostgreSQL into
//! per-tenant search indices.
//!
//! ## Pipeline
//!
//! - [`source`] - row discovery and grouping (point-query or streaming cursor)
//! - [`transform`] - eligibility filtering and document shaping
//! - [`submit`] - bounded batch accumulation and bulk submission
//! - [`store`] - document store bulk-upsert client
//! - [`checkpoint`] - durable checkpoint set and append-only failure log
//! - [`driver`] - run orchestration and per-flush reconciliation
//!
//! ## Guarantees
//!
//! At-least-once delivery with exactly-once effective state: an id enters the
//! checkpoint set only after the document store confirms its write, the
//! checkpoint is persisted atomically after every flush that grows it, and a
//! re-run skips every checkpointed unit. Failed ids are recorded in the
//! failure log and retried naturally on the next run.

pub mod checkpoint;
pub mod config;
pub mod database;
pub mod driver;
pub mod error;
pub mod logging;
pub mod models;
pub mod source;
pub mod store;
pub mod submit;
pub mod transform;

pub use checkpoint::{CheckpointSet, FailureLog, FailureRecord};
pub use config::{BackfillConfig, DatabaseConfig, SearchStoreConfig, SourceMode, SyncConfig};
pub use driver::{RunSummary, SyncDriver};
pub use error::{BackfillError, BackfillResult, StoreError};
pub use models::{ScoreDetail, SkipReason, SyncTarget, UnitOutcome, UnitRows};
pub use source::{PointQuerySource, RowSource, StreamingCursorSource};
pub use store::{DocumentStore, ItemOutcome, SearchStoreClient};
pub use submit::{BatchSubmitter, FlushOutcome, FlushReason};
pub use transform::Transformer;

//! # Checkpoint Set & Failure Log
//!
//! The only durable state the pipeline owns.
//!
//! The checkpoint set is a JSON array of unit ids confirmed written to the
//! document store. It grows monotonically, is read permissively (a missing,
//! empty, or malformed file degrades to an empty set with a warning), and is
//! persisted via write-temp-then-rename so a crash never leaves a partially
//! written file.
//!
//! The failure log is append-only NDJSON, one `{id, reason, timestamp}`
//! record per line, never deduplicated.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{BackfillError, BackfillResult};

/// Persisted set of unit ids confirmed written to the document store
#[derive(Debug)]
pub struct CheckpointSet {
    path: PathBuf,
    ids: HashSet<String>,
}

impl CheckpointSet {
    /// Load the checkpoint set from disk, degrading to empty on any
    /// read or parse problem.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let ids = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => {
                warn!(path = %path.display(), "Checkpoint file empty, starting from an empty set");
                HashSet::new()
            }
            Ok(contents) => match serde_json::from_str::<Vec<String>>(&contents) {
                Ok(ids) => {
                    debug!(path = %path.display(), count = ids.len(), "Loaded checkpoint set");
                    ids.into_iter().collect()
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Checkpoint file malformed, starting from an empty set"
                    );
                    HashSet::new()
                }
            },
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Checkpoint file unreadable, starting from an empty set"
                );
                HashSet::new()
            }
        };

        Self { path, ids }
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Add confirmed ids; returns how many were new
    pub fn insert_all<I, S>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.ids.len();
        for id in ids {
            self.ids.insert(id.into());
        }
        self.ids.len() - before
    }

    /// Persist the set atomically: write a temp file in the same directory,
    /// then rename over the destination.
    pub fn persist(&self) -> BackfillResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut sorted: Vec<&String> = self.ids.iter().collect();
        sorted.sort();
        let contents = serde_json::to_string_pretty(&sorted)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| {
            BackfillError::checkpoint(self.path.display().to_string(), e.to_string())
        })?;

        debug!(path = %self.path.display(), count = self.ids.len(), "Persisted checkpoint set");
        Ok(())
    }
}

/// One failure-log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub id: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only NDJSON log of failed unit ids
#[derive(Debug)]
pub struct FailureLog {
    path: PathBuf,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record per id, all tagged with the same reason.
    /// Creates the file on first write.
    pub fn append<'a, I>(&self, ids: I, reason: &str) -> BackfillResult<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let now = Utc::now();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut written = 0;
        for id in ids {
            let record = FailureRecord {
                id: id.to_string(),
                reason: reason.to_string(),
                timestamp: now,
            };
            let line = serde_json::to_string(&record)?;
            writeln!(file, "{line}")?;
            written += 1;
        }

        Ok(written)
    }
}

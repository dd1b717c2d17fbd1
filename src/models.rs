//! # Data Model
//!
//! Row structs read from the relational source and the domain types the
//! pipeline derives from them.
//!
//! A **unit** is one evaluation. Its raw rows (one per scored category, plus
//! the tenant-resolution join columns) are grouped into [`UnitRows`], which
//! the transformer turns into either an eligible [`SyncTarget`] or an
//! explicit skip.

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// One row of the wide streaming join.
///
/// The join is a LEFT JOIN from evaluations to score details, so an
/// evaluation with no details still yields one row with null detail columns
/// and is counted as skipped rather than silently missed.
#[derive(Debug, Clone, FromRow)]
pub struct WideRow {
    pub evaluation_id: String,
    pub category_id: Option<i64>,
    pub score: Option<f64>,
    pub justification: Option<String>,
    pub phrases: Option<Json<Vec<String>>>,
    pub category_slug: Option<String>,
    pub category_name: Option<String>,
    pub client_external_id: Option<String>,
    pub contact_client_external_id: Option<String>,
}

/// One score detail row for a known evaluation (point-query mode)
#[derive(Debug, Clone, FromRow)]
pub struct DetailRow {
    pub category_id: i64,
    pub score: f64,
    pub justification: Option<String>,
    pub phrases: Option<Json<Vec<String>>>,
    pub category_slug: Option<String>,
    pub category_name: Option<String>,
}

/// Tenant-resolution join columns for one evaluation (point-query mode)
#[derive(Debug, Clone, FromRow)]
pub struct TenantRow {
    pub client_external_id: Option<String>,
    pub contact_client_external_id: Option<String>,
}

/// All raw rows for one unit, grouped and ready for transformation
#[derive(Debug, Clone)]
pub struct UnitRows {
    pub evaluation_id: String,
    /// External id of the client directly attached to the evaluation
    pub client_external_id: Option<String>,
    /// External id of the client owning the evaluation's contact
    pub contact_client_external_id: Option<String>,
    pub rows: Vec<DetailRow>,
}

/// One category-scored sub-result in the output payload.
///
/// Absent fields are omitted from the serialized document, never emitted as
/// nulls or empty arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreDetail {
    pub category_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub score: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phrases: Option<Vec<String>>,
}

impl ScoreDetail {
    /// A detail with no slug, name, justification, and phrases carries no
    /// information and is excluded from output.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slug.is_none()
            && self.name.is_none()
            && self.justification.is_none()
            && self.phrases.is_none()
    }
}

/// One pending document upsert: destination index, document id, payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTarget {
    pub index: String,
    pub document_id: String,
    pub score_details: Vec<ScoreDetail>,
}

impl SyncTarget {
    /// Partial-update document body: the surviving details under one field
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        serde_json::json!({ "scoreDetails": self.score_details })
    }
}

/// Why a unit was skipped rather than staged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The evaluation has no score detail rows at all
    NoDetailRows,
    /// Every detail was empty after field normalization
    AllDetailsEmpty,
    /// Neither tenant-resolution candidate produced an identifier
    NoTenant,
    /// The resolved tenant matches the configured excluded sentinel
    ExcludedTenant,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::NoDetailRows => "no detail rows",
            SkipReason::AllDetailsEmpty => "all details empty",
            SkipReason::NoTenant => "no resolvable tenant",
            SkipReason::ExcludedTenant => "excluded tenant",
        };
        write!(f, "{s}")
    }
}

/// Per-unit transformation outcome, so driver branching is exhaustive
#[derive(Debug, Clone)]
pub enum UnitOutcome {
    Eligible(SyncTarget),
    Skipped(SkipReason),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(slug: Option<&str>, justification: Option<&str>) -> ScoreDetail {
        ScoreDetail {
            category_id: 1,
            slug: slug.map(String::from),
            name: None,
            score: 3,
            justification: justification.map(String::from),
            phrases: None,
        }
    }

    #[test]
    fn detail_with_all_optional_fields_absent_is_empty() {
        assert!(detail(None, None).is_empty());
        assert!(!detail(Some("clarity"), None).is_empty());
        assert!(!detail(None, Some("spoke clearly")).is_empty());
    }

    #[test]
    fn payload_omits_absent_fields() {
        let target = SyncTarget {
            index: "score-details-acme".to_string(),
            document_id: "eval-1".to_string(),
            score_details: vec![detail(Some("clarity"), None)],
        };
        let payload = target.payload();
        let first = &payload["scoreDetails"][0];
        assert_eq!(first["categoryId"], 1);
        assert_eq!(first["slug"], "clarity");
        assert!(first.get("name").is_none());
        assert!(first.get("justification").is_none());
        assert!(first.get("phrases").is_none());
    }
}

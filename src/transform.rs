//! # Transformer
//!
//! Pure eligibility and shaping rules: raw unit rows in, an explicit
//! [`UnitOutcome`] out. No side effects; the only inputs besides the rows
//! are the excluded-tenant sentinel and the index prefix.

use crate::models::{DetailRow, ScoreDetail, SkipReason, SyncTarget, UnitOutcome, UnitRows};

/// Applies filtering, normalization, and tenant resolution to one unit
#[derive(Debug, Clone)]
pub struct Transformer {
    excluded_tenant: String,
    index_prefix: String,
}

impl Transformer {
    pub fn new(excluded_tenant: impl Into<String>, index_prefix: impl Into<String>) -> Self {
        Self {
            excluded_tenant: excluded_tenant.into(),
            index_prefix: index_prefix.into(),
        }
    }

    /// Evaluate one unit: either an eligible sync target or a skip reason
    pub fn evaluate(&self, unit: &UnitRows) -> UnitOutcome {
        if unit.rows.is_empty() {
            return UnitOutcome::Skipped(SkipReason::NoDetailRows);
        }

        let details: Vec<ScoreDetail> = unit
            .rows
            .iter()
            .map(build_detail)
            .filter(|d| !d.is_empty())
            .collect();

        if details.is_empty() {
            return UnitOutcome::Skipped(SkipReason::AllDetailsEmpty);
        }

        let Some(tenant) = resolve_tenant(unit) else {
            return UnitOutcome::Skipped(SkipReason::NoTenant);
        };

        if tenant.eq_ignore_ascii_case(&self.excluded_tenant) {
            return UnitOutcome::Skipped(SkipReason::ExcludedTenant);
        }

        UnitOutcome::Eligible(SyncTarget {
            index: self.index_name(&tenant),
            document_id: unit.evaluation_id.clone(),
            score_details: details,
        })
    }

    /// Destination index for a tenant: deterministic, lowercase as the
    /// search engine requires.
    #[must_use]
    pub fn index_name(&self, tenant: &str) -> String {
        format!("{}-{}", self.index_prefix, tenant.to_lowercase())
    }
}

/// Resolve the tenant identifier: the client directly on the evaluation wins,
/// else the client owning the evaluation's contact, else absent.
fn resolve_tenant(unit: &UnitRows) -> Option<String> {
    non_empty(unit.client_external_id.as_deref())
        .or_else(|| non_empty(unit.contact_client_external_id.as_deref()))
}

/// Build an output detail from a raw row, normalizing empty strings and
/// empty phrase lists to absent fields.
fn build_detail(row: &DetailRow) -> ScoreDetail {
    ScoreDetail {
        category_id: row.category_id,
        slug: non_empty(row.category_slug.as_deref()),
        name: non_empty(row.category_name.as_deref()),
        score: round_score(row.score),
        justification: non_empty(row.justification.as_deref()),
        phrases: row
            .phrases
            .as_ref()
            .map(|p| p.0.clone())
            .filter(|p| !p.is_empty()),
    }
}

/// Round a stored numeric score to the nearest integer, halves away from zero
fn round_score(score: f64) -> i32 {
    score.round() as i32
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.is_empty()).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sqlx::types::Json;

    fn row(
        category_id: i64,
        score: f64,
        slug: Option<&str>,
        justification: Option<&str>,
        phrases: Option<Vec<&str>>,
    ) -> DetailRow {
        DetailRow {
            category_id,
            score,
            justification: justification.map(String::from),
            phrases: phrases.map(|p| Json(p.into_iter().map(String::from).collect())),
            category_slug: slug.map(String::from),
            category_name: None,
        }
    }

    fn unit(client: Option<&str>, contact_client: Option<&str>, rows: Vec<DetailRow>) -> UnitRows {
        UnitRows {
            evaluation_id: "eval-1".to_string(),
            client_external_id: client.map(String::from),
            contact_client_external_id: contact_client.map(String::from),
            rows,
        }
    }

    fn transformer() -> Transformer {
        Transformer::new("unassigned", "score-details")
    }

    #[test]
    fn score_rounding_half_goes_up() {
        assert_eq!(round_score(3.5), 4);
        assert_eq!(round_score(3.49), 3);
        assert_eq!(round_score(0.0), 0);
    }

    #[test]
    fn no_detail_rows_is_skipped() {
        let outcome = transformer().evaluate(&unit(Some("acme"), None, vec![]));
        assert!(matches!(
            outcome,
            UnitOutcome::Skipped(SkipReason::NoDetailRows)
        ));
    }

    #[test]
    fn all_empty_details_is_skipped() {
        let rows = vec![
            row(1, 3.0, None, None, None),
            row(2, 4.0, None, None, Some(vec![])),
        ];
        let outcome = transformer().evaluate(&unit(Some("acme"), None, rows));
        assert!(matches!(
            outcome,
            UnitOutcome::Skipped(SkipReason::AllDetailsEmpty)
        ));
    }

    #[test]
    fn empty_details_are_dropped_but_unit_survives() {
        let rows = vec![
            row(1, 3.0, None, None, None),
            row(2, 4.6, Some("clarity"), Some("spoke clearly"), None),
        ];
        let outcome = transformer().evaluate(&unit(Some("acme"), None, rows));
        let UnitOutcome::Eligible(target) = outcome else {
            panic!("expected eligible unit");
        };
        assert_eq!(target.score_details.len(), 1);
        assert_eq!(target.score_details[0].category_id, 2);
        assert_eq!(target.score_details[0].score, 5);
    }

    #[test]
    fn empty_strings_and_empty_phrase_lists_become_absent() {
        let rows = vec![DetailRow {
            category_id: 1,
            score: 2.0,
            justification: Some(String::new()),
            phrases: Some(Json(vec![])),
            category_slug: Some("clarity".to_string()),
            category_name: Some(String::new()),
        }];
        let outcome = transformer().evaluate(&unit(Some("acme"), None, rows));
        let UnitOutcome::Eligible(target) = outcome else {
            panic!("expected eligible unit");
        };
        let detail = &target.score_details[0];
        assert_eq!(detail.slug.as_deref(), Some("clarity"));
        assert!(detail.name.is_none());
        assert!(detail.justification.is_none());
        assert!(detail.phrases.is_none());
    }

    #[test]
    fn tenant_falls_back_to_contact_client() {
        let rows = vec![row(1, 3.0, Some("clarity"), None, None)];
        let outcome = transformer().evaluate(&unit(None, Some("Umbrella"), rows));
        let UnitOutcome::Eligible(target) = outcome else {
            panic!("expected eligible unit");
        };
        assert_eq!(target.index, "score-details-umbrella");
    }

    #[test]
    fn unresolvable_tenant_is_skipped() {
        let rows = vec![row(1, 3.0, Some("clarity"), None, None)];
        let outcome = transformer().evaluate(&unit(None, Some(""), rows));
        assert!(matches!(outcome, UnitOutcome::Skipped(SkipReason::NoTenant)));
    }

    #[test]
    fn excluded_tenant_matches_case_insensitively() {
        let rows = vec![row(1, 3.0, Some("clarity"), None, None)];
        let outcome = transformer().evaluate(&unit(Some("UNASSIGNED"), None, rows));
        assert!(matches!(
            outcome,
            UnitOutcome::Skipped(SkipReason::ExcludedTenant)
        ));
    }

    #[test]
    fn direct_client_wins_over_contact_client() {
        let rows = vec![row(1, 3.0, Some("clarity"), None, None)];
        let outcome = transformer().evaluate(&unit(Some("Acme"), Some("umbrella"), rows));
        let UnitOutcome::Eligible(target) = outcome else {
            panic!("expected eligible unit");
        };
        assert_eq!(target.index, "score-details-acme");
        assert_eq!(target.document_id, "eval-1");
    }

    proptest! {
        #[test]
        fn rounding_never_moves_more_than_half(score in -10_000.0f64..10_000.0) {
            let rounded = round_score(score);
            prop_assert!((f64::from(rounded) - score).abs() <= 0.5);
        }
    }
}

//! # Row Source
//!
//! Produces grouped unit rows from the relational store. Two interchangeable
//! strategies behind one trait, selected by configuration:
//!
//! - [`PointQuerySource`]: list distinct evaluation ids up front, then run a
//!   detail query and a tenant-resolution query per unit. Acceptable for
//!   small/medium volumes.
//! - [`StreamingCursorSource`]: one wide join over evaluations, details,
//!   categories, and tenant resolution, read in fixed-size row batches via a
//!   keyset cursor ordered by `(evaluation_id, category_id)`. Memory stays
//!   bounded regardless of total volume. The trailing partial group of each
//!   page is carried into the next fetch, so a unit whose rows straddle a
//!   page boundary is still emitted complete, exactly once.
//!
//! Any query failure here is fatal to the run.

use std::collections::VecDeque;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::BackfillResult;
use crate::models::{DetailRow, TenantRow, UnitRows, WideRow};

/// Lazy, finite sequence of complete units. Not restartable mid-run.
#[async_trait]
pub trait RowSource: Send {
    /// The next complete unit, or `None` at end of stream
    async fn next_unit(&mut self) -> BackfillResult<Option<UnitRows>>;
}

const DETAIL_QUERY: &str = r"
    SELECT d.score_category_id AS category_id,
           d.score::float8 AS score,
           d.justification,
           d.phrases,
           c.slug AS category_slug,
           c.name AS category_name
    FROM evaluation_score_details d
    LEFT JOIN score_categories c ON c.id = d.score_category_id
    WHERE d.evaluation_id = $1
    ORDER BY d.score_category_id
";

const TENANT_QUERY: &str = r"
    SELECT cl.external_id AS client_external_id,
           ccl.external_id AS contact_client_external_id
    FROM evaluations e
    LEFT JOIN clients cl ON cl.id = e.client_id
    LEFT JOIN contacts ct ON ct.id = e.contact_id
    LEFT JOIN clients ccl ON ccl.id = ct.client_id
    WHERE e.id = $1
";

/// Point-query strategy: distinct-id discovery plus per-unit lookups
pub struct PointQuerySource {
    pool: PgPool,
    ids: VecDeque<String>,
}

impl PointQuerySource {
    /// Discover the unit universe and prepare per-unit iteration
    pub async fn discover(pool: PgPool) -> BackfillResult<Self> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM evaluations ORDER BY id")
                .fetch_all(&pool)
                .await?;

        Ok(Self {
            pool,
            ids: ids.into(),
        })
    }
}

#[async_trait]
impl RowSource for PointQuerySource {
    async fn next_unit(&mut self) -> BackfillResult<Option<UnitRows>> {
        let Some(evaluation_id) = self.ids.pop_front() else {
            return Ok(None);
        };

        let rows: Vec<DetailRow> = sqlx::query_as(DETAIL_QUERY)
            .bind(&evaluation_id)
            .fetch_all(&self.pool)
            .await?;

        let tenant: Option<TenantRow> = sqlx::query_as(TENANT_QUERY)
            .bind(&evaluation_id)
            .fetch_optional(&self.pool)
            .await?;

        let (client_external_id, contact_client_external_id) = tenant
            .map(|t| (t.client_external_id, t.contact_client_external_id))
            .unwrap_or((None, None));

        Ok(Some(UnitRows {
            evaluation_id,
            client_external_id,
            contact_client_external_id,
            rows,
        }))
    }
}

const WIDE_QUERY: &str = r"
    SELECT e.id AS evaluation_id,
           d.score_category_id AS category_id,
           d.score::float8 AS score,
           d.justification,
           d.phrases,
           c.slug AS category_slug,
           c.name AS category_name,
           cl.external_id AS client_external_id,
           ccl.external_id AS contact_client_external_id
    FROM evaluations e
    LEFT JOIN evaluation_score_details d ON d.evaluation_id = e.id
    LEFT JOIN score_categories c ON c.id = d.score_category_id
    LEFT JOIN clients cl ON cl.id = e.client_id
    LEFT JOIN contacts ct ON ct.id = e.contact_id
    LEFT JOIN clients ccl ON ccl.id = ct.client_id
    WHERE (e.id, COALESCE(d.score_category_id, -1)) > ($1::text, $2::bigint)
    ORDER BY e.id, COALESCE(d.score_category_id, -1)
    LIMIT $3
";

/// Streaming strategy: keyset-paginated wide join with cross-page group carry
pub struct StreamingCursorSource {
    pool: PgPool,
    batch_rows: i64,
    /// Keyset position: (evaluation id, category key) of the last row read
    cursor: (String, i64),
    ready: VecDeque<UnitRows>,
    carry: Option<UnitRows>,
    exhausted: bool,
}

impl StreamingCursorSource {
    pub fn new(pool: PgPool, batch_rows: i64) -> Self {
        Self {
            pool,
            batch_rows,
            cursor: (String::new(), -1),
            ready: VecDeque::new(),
            carry: None,
            exhausted: false,
        }
    }

    async fn fetch_page(&mut self) -> BackfillResult<()> {
        let rows: Vec<WideRow> = sqlx::query_as(WIDE_QUERY)
            .bind(&self.cursor.0)
            .bind(self.cursor.1)
            .bind(self.batch_rows)
            .fetch_all(&self.pool)
            .await?;

        if (rows.len() as i64) < self.batch_rows {
            self.exhausted = true;
        }

        if let Some(last) = rows.last() {
            self.cursor = (
                last.evaluation_id.clone(),
                last.category_id.unwrap_or(-1),
            );
        }

        let (complete, carry) = group_wide_rows(rows, self.carry.take());
        self.ready.extend(complete);
        self.carry = carry;
        Ok(())
    }
}

#[async_trait]
impl RowSource for StreamingCursorSource {
    async fn next_unit(&mut self) -> BackfillResult<Option<UnitRows>> {
        loop {
            if let Some(unit) = self.ready.pop_front() {
                return Ok(Some(unit));
            }
            if self.exhausted {
                // Last partial group is complete once the cursor is drained.
                return Ok(self.carry.take());
            }
            self.fetch_page().await?;
        }
    }
}

/// Group ordered wide rows by evaluation id. The final group is returned
/// separately as carry since the next page may continue it.
fn group_wide_rows(
    rows: Vec<WideRow>,
    carry: Option<UnitRows>,
) -> (Vec<UnitRows>, Option<UnitRows>) {
    let mut complete = Vec::new();
    let mut current = carry;

    for row in rows {
        let continues = current
            .as_ref()
            .is_some_and(|u| u.evaluation_id == row.evaluation_id);

        if !continues {
            if let Some(done) = current.take() {
                complete.push(done);
            }
            current = Some(UnitRows {
                evaluation_id: row.evaluation_id.clone(),
                client_external_id: row.client_external_id.clone(),
                contact_client_external_id: row.contact_client_external_id.clone(),
                rows: Vec::new(),
            });
        }

        // A null category means the LEFT JOIN found no details for this
        // evaluation; the unit still exists, with zero rows.
        if let (Some(category_id), Some(score)) = (row.category_id, row.score) {
            if let Some(unit) = current.as_mut() {
                unit.rows.push(DetailRow {
                    category_id,
                    score,
                    justification: row.justification,
                    phrases: row.phrases,
                    category_slug: row.category_slug,
                    category_name: row.category_name,
                });
            }
        }
    }

    (complete, current)
}

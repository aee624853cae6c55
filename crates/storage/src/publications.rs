//! Monthly map publications.

use crate::store::{is_unique_violation, page_offset, query_failed, Page, Store, PAGE_SIZE};
use cdi_common::{CategoryValue, CdiError, CdiResult, PublicationStatus, YearMonth};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{FromRow, QueryBuilder, Sqlite};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Publication {
    pub id: i64,
    pub year_month: YearMonth,
    pub cdi_geonode_id: i64,
    pub initial_values: Vec<CategoryValue>,
    pub validated_values: Option<Vec<CategoryValue>>,
    pub due_date: NaiveDate,
    pub status: PublicationStatus,
    pub narrative: Option<String>,
    pub bulletin_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields for a new publication and its reviews.
#[derive(Debug, Clone)]
pub struct NewPublication {
    pub year_month: YearMonth,
    pub cdi_geonode_id: i64,
    pub initial_values: Vec<CategoryValue>,
    pub validated_values: Option<Vec<CategoryValue>>,
    pub due_date: NaiveDate,
    pub status: PublicationStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub reviewer_ids: Vec<i64>,
}

#[derive(FromRow)]
struct PublicationRow {
    id: i64,
    year_month: NaiveDate,
    cdi_geonode_id: i64,
    initial_values: Json<Vec<CategoryValue>>,
    validated_values: Option<Json<Vec<CategoryValue>>>,
    due_date: NaiveDate,
    status: i64,
    narrative: Option<String>,
    bulletin_url: Option<String>,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<PublicationRow> for Publication {
    type Error = CdiError;

    fn try_from(row: PublicationRow) -> CdiResult<Self> {
        let status = PublicationStatus::from_code(row.status)
            .ok_or_else(|| CdiError::DatabaseError(format!("unknown status {}", row.status)))?;
        Ok(Publication {
            id: row.id,
            year_month: YearMonth::of(row.year_month),
            cdi_geonode_id: row.cdi_geonode_id,
            initial_values: row.initial_values.0,
            validated_values: row.validated_values.map(|v| v.0),
            due_date: row.due_date,
            status,
            narrative: row.narrative,
            bulletin_url: row.bulletin_url,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

const PUBLICATION_COLUMNS: &str = "id, year_month, cdi_geonode_id, initial_values, validated_values, \
     due_date, status, narrative, bulletin_url, published_at, created_at, updated_at, deleted_at";

fn convert(rows: Vec<PublicationRow>) -> CdiResult<Vec<Publication>> {
    rows.into_iter().map(Publication::try_from).collect()
}

impl Store {
    /// Insert a publication and one empty review per reviewer, atomically.
    pub async fn create_publication(&self, new: &NewPublication) -> CdiResult<Publication> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(query_failed)?;

        let id = sqlx::query(
            r#"
            INSERT INTO publications
                (year_month, cdi_geonode_id, initial_values, validated_values, due_date,
                 status, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.year_month.first_day())
        .bind(new.cdi_geonode_id)
        .bind(Json(&new.initial_values))
        .bind(new.validated_values.as_ref().map(Json))
        .bind(new.due_date)
        .bind(new.status.code())
        .bind(new.published_at)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CdiError::invalid(
                    "cdi_geonode_id",
                    format!("resource {} already has a publication", new.cdi_geonode_id),
                )
            } else {
                query_failed(e)
            }
        })?
        .last_insert_rowid();

        for reviewer_id in &new.reviewer_ids {
            sqlx::query(
                "INSERT INTO reviews (publication_id, user_id, suggestion_values, created_at, updated_at) \
                 VALUES (?, ?, '[]', ?, ?)",
            )
            .bind(id)
            .bind(reviewer_id)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(query_failed)?;
        }
        tx.commit().await.map_err(query_failed)?;

        info!(
            publication_id = id,
            year_month = %new.year_month,
            geonode_id = new.cdi_geonode_id,
            reviewers = new.reviewer_ids.len(),
            "Created publication"
        );
        self.get_publication(id).await?.ok_or(CdiError::NotFound("Publication"))
    }

    /// Fetch a publication that is not soft-deleted.
    pub async fn get_publication(&self, id: i64) -> CdiResult<Option<Publication>> {
        let row: Option<PublicationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM publications WHERE id = ? AND deleted_at IS NULL",
            PUBLICATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;
        row.map(Publication::try_from).transpose()
    }

    /// Look up by catalog resource id, soft-deleted rows included.
    pub async fn find_publication_by_geonode_id(&self, geonode_id: i64) -> CdiResult<Option<Publication>> {
        let row: Option<PublicationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM publications WHERE cdi_geonode_id = ?",
            PUBLICATION_COLUMNS
        ))
        .bind(geonode_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;
        row.map(Publication::try_from).transpose()
    }

    /// Live publications for the given catalog resource ids.
    pub async fn publications_by_geonode_ids(&self, ids: &[i64]) -> CdiResult<Vec<Publication>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM publications WHERE deleted_at IS NULL AND cdi_geonode_id IN (",
            PUBLICATION_COLUMNS
        ));
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows: Vec<PublicationRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed)?;
        convert(rows)
    }

    /// Paginated listing, newest month first.
    pub async fn list_publications(
        &self,
        page: i64,
        status: Option<PublicationStatus>,
    ) -> CdiResult<Page<Publication>> {
        let status_code = status.map(|s| s.code());
        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM publications WHERE deleted_at IS NULL AND (? IS NULL OR status = ?)",
        )
        .bind(status_code)
        .bind(status_code)
        .fetch_one(&self.pool)
        .await
        .map_err(query_failed)?;

        let rows: Vec<PublicationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM publications WHERE deleted_at IS NULL AND (? IS NULL OR status = ?) \
             ORDER BY year_month DESC, id DESC LIMIT ? OFFSET ?",
            PUBLICATION_COLUMNS
        ))
        .bind(status_code)
        .bind(status_code)
        .bind(PAGE_SIZE)
        .bind(page_offset(page))
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(Page {
            items: convert(rows)?,
            total: total.0,
            page: page.max(1),
        })
    }

    /// Published maps with `year_month` inside the inclusive range.
    pub async fn list_published(
        &self,
        page: i64,
        left: Option<NaiveDate>,
        right: Option<NaiveDate>,
    ) -> CdiResult<Page<Publication>> {
        let published = PublicationStatus::Published.code();
        let filter = "deleted_at IS NULL AND status = ? \
                      AND (? IS NULL OR year_month >= ?) AND (? IS NULL OR year_month <= ?)";

        let total: (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM publications WHERE {}", filter))
                .bind(published)
                .bind(left)
                .bind(left)
                .bind(right)
                .bind(right)
                .fetch_one(&self.pool)
                .await
                .map_err(query_failed)?;

        let rows: Vec<PublicationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM publications WHERE {} ORDER BY year_month DESC, id DESC LIMIT ? OFFSET ?",
            PUBLICATION_COLUMNS, filter
        ))
        .bind(published)
        .bind(left)
        .bind(left)
        .bind(right)
        .bind(right)
        .bind(PAGE_SIZE)
        .bind(page_offset(page))
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(Page {
            items: convert(rows)?,
            total: total.0,
            page: page.max(1),
        })
    }

    /// A published map by id.
    pub async fn get_published(&self, id: i64) -> CdiResult<Option<Publication>> {
        Ok(self
            .get_publication(id)
            .await?
            .filter(|p| p.status == PublicationStatus::Published))
    }

    /// `(id, month)` of every published map, newest first.
    pub async fn published_dates(&self, exclude_id: Option<i64>) -> CdiResult<Vec<(i64, YearMonth)>> {
        let rows: Vec<(i64, NaiveDate)> = sqlx::query_as(
            "SELECT id, year_month FROM publications \
             WHERE deleted_at IS NULL AND status = ? AND (? IS NULL OR id != ?) \
             ORDER BY year_month DESC",
        )
        .bind(PublicationStatus::Published.code())
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(rows.into_iter().map(|(id, d)| (id, YearMonth::of(d))).collect())
    }

    /// Persist every mutable field of a publication.
    pub async fn save_publication(&self, publication: &Publication) -> CdiResult<Publication> {
        let result = sqlx::query(
            r#"
            UPDATE publications
            SET initial_values = ?, validated_values = ?, due_date = ?, status = ?,
                narrative = ?, bulletin_url = ?, published_at = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(Json(&publication.initial_values))
        .bind(publication.validated_values.as_ref().map(Json))
        .bind(publication.due_date)
        .bind(publication.status.code())
        .bind(&publication.narrative)
        .bind(&publication.bulletin_url)
        .bind(publication.published_at)
        .bind(Utc::now())
        .bind(publication.id)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        if result.rows_affected() == 0 {
            return Err(CdiError::NotFound("Publication"));
        }
        debug!(publication_id = publication.id, status = %publication.status, "Saved publication");
        self.get_publication(publication.id)
            .await?
            .ok_or(CdiError::NotFound("Publication"))
    }

    pub async fn set_initial_values(&self, id: i64, values: &[CategoryValue]) -> CdiResult<()> {
        let result = sqlx::query(
            "UPDATE publications SET initial_values = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(Json(values))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        if result.rows_affected() == 0 {
            return Err(CdiError::NotFound("Publication"));
        }
        info!(publication_id = id, regions = values.len(), "Stored initial values");
        Ok(())
    }

    /// Write only the status column.
    ///
    /// Workflow steps that run alongside admin edits use this instead of
    /// [`Store::save_publication`], so a concurrent narrative or value change
    /// is never overwritten with a stale copy.
    pub async fn set_publication_status(&self, id: i64, status: PublicationStatus) -> CdiResult<()> {
        let result = sqlx::query(
            "UPDATE publications SET status = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(status.code())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        if result.rows_affected() == 0 {
            return Err(CdiError::NotFound("Publication"));
        }
        info!(publication_id = id, %status, "Updated publication status");
        Ok(())
    }

    /// Store validated values and mark the publication `Published`.
    ///
    /// # Arguments
    ///
    /// * `values` - the validated per-region categories
    /// * `published_at` - used only when the publication has no publication
    ///   date yet
    pub async fn publish_validated_values(
        &self,
        id: i64,
        values: &[CategoryValue],
        published_at: DateTime<Utc>,
    ) -> CdiResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE publications
            SET validated_values = ?, status = ?,
                published_at = COALESCE(published_at, ?), updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(Json(values))
        .bind(PublicationStatus::Published.code())
        .bind(published_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        if result.rows_affected() == 0 {
            return Err(CdiError::NotFound("Publication"));
        }
        info!(publication_id = id, regions = values.len(), "Published validated values");
        Ok(())
    }

    /// Mark as deleted. Returns false when already gone.
    pub async fn soft_delete_publication(&self, id: i64) -> CdiResult<bool> {
        let result = sqlx::query(
            "UPDATE publications SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(publication_id = id, "Soft-deleted publication");
        }
        Ok(deleted)
    }
}

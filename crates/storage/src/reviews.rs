//! Reviewer assignments and their suggestions.

use crate::store::{page_offset, query_failed, Page, Store, PAGE_SIZE};
use cdi_common::review::{ReviewSnapshot, ReviewerInfo};
use cdi_common::{CdiError, CdiResult, Suggestion, YearMonth};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub id: i64,
    pub publication_id: i64,
    pub user_id: i64,
    pub is_completed: bool,
    pub suggestion_values: Vec<Suggestion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_overdue_notified: bool,
}

#[derive(FromRow)]
struct ReviewRow {
    id: i64,
    publication_id: i64,
    user_id: i64,
    is_completed: bool,
    suggestion_values: Json<Vec<Suggestion>>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    is_overdue_notified: bool,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            publication_id: row.publication_id,
            user_id: row.user_id,
            is_completed: row.is_completed,
            suggestion_values: row.suggestion_values.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
            is_overdue_notified: row.is_overdue_notified,
        }
    }
}

/// A review joined with its reviewer, for aggregation.
#[derive(FromRow)]
struct SnapshotRow {
    id: i64,
    is_completed: bool,
    completed_at: Option<DateTime<Utc>>,
    suggestion_values: Json<Vec<Suggestion>>,
    user_id: i64,
    name: String,
    email: String,
    technical_working_group: Option<String>,
}

/// An overdue review with what the reminder needs.
#[derive(Debug, Clone, PartialEq)]
pub struct OverdueReview {
    pub review_id: i64,
    pub publication_id: i64,
    pub year_month: YearMonth,
    pub due_date: NaiveDate,
    pub reviewer: ReviewerInfo,
}

#[derive(FromRow)]
struct OverdueRow {
    review_id: i64,
    publication_id: i64,
    year_month: NaiveDate,
    due_date: NaiveDate,
    user_id: i64,
    name: String,
    email: String,
    technical_working_group: Option<String>,
}

const REVIEW_COLUMNS: &str = "id, publication_id, user_id, is_completed, suggestion_values, \
     created_at, updated_at, completed_at, is_overdue_notified";

impl Store {
    pub async fn get_review(&self, id: i64) -> CdiResult<Option<Review>> {
        let row: Option<ReviewRow> =
            sqlx::query_as(&format!("SELECT {} FROM reviews WHERE id = ?", REVIEW_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(query_failed)?;
        Ok(row.map(Review::from))
    }

    pub async fn reviews_for_publication(&self, publication_id: i64) -> CdiResult<Vec<Review>> {
        let rows: Vec<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reviews WHERE publication_id = ? ORDER BY id ASC",
            REVIEW_COLUMNS
        ))
        .bind(publication_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(rows.into_iter().map(Review::from).collect())
    }

    /// A reviewer's assignments on live publications, newest first.
    pub async fn reviews_for_user(&self, user_id: i64, page: i64) -> CdiResult<Page<Review>> {
        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM reviews r JOIN publications p ON p.id = r.publication_id \
             WHERE r.user_id = ? AND p.deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(query_failed)?;

        let rows: Vec<ReviewRow> = sqlx::query_as(
            "SELECT r.id, r.publication_id, r.user_id, r.is_completed, r.suggestion_values, \
                    r.created_at, r.updated_at, r.completed_at, r.is_overdue_notified \
             FROM reviews r JOIN publications p ON p.id = r.publication_id \
             WHERE r.user_id = ? AND p.deleted_at IS NULL \
             ORDER BY r.id DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(PAGE_SIZE)
        .bind(page_offset(page))
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(Page {
            items: rows.into_iter().map(Review::from).collect(),
            total: total.0,
            page: page.max(1),
        })
    }

    /// Reviews of a publication with reviewer profiles attached.
    pub async fn review_snapshots(&self, publication_id: i64) -> CdiResult<Vec<ReviewSnapshot>> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(
            "SELECT r.id, r.is_completed, r.completed_at, r.suggestion_values, \
                    u.id AS user_id, u.name, u.email, u.technical_working_group \
             FROM reviews r JOIN users u ON u.id = r.user_id \
             WHERE r.publication_id = ? ORDER BY r.id ASC",
        )
        .bind(publication_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(rows
            .into_iter()
            .map(|row| ReviewSnapshot {
                id: row.id,
                user: ReviewerInfo {
                    id: row.user_id,
                    name: row.name,
                    email: row.email,
                    technical_working_group: row.technical_working_group,
                },
                is_completed: row.is_completed,
                completed_at: row.completed_at,
                suggestion_values: row.suggestion_values.0,
            })
            .collect())
    }

    /// Store suggestions; completing stamps `completed_at` once.
    ///
    /// # Arguments
    ///
    /// * `id` - review to update
    /// * `suggestion_values` - replaces the stored suggestions wholesale
    /// * `is_completed` - reopening a review clears `completed_at`
    pub async fn update_review(
        &self,
        id: i64,
        suggestion_values: &[Suggestion],
        is_completed: bool,
    ) -> CdiResult<Review> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE reviews
            SET suggestion_values = ?, is_completed = ?, updated_at = ?,
                completed_at = CASE WHEN ? THEN COALESCE(completed_at, ?) ELSE NULL END
            WHERE id = ?
            "#,
        )
        .bind(Json(suggestion_values))
        .bind(is_completed)
        .bind(now)
        .bind(is_completed)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        if result.rows_affected() == 0 {
            return Err(CdiError::NotFound("Review"));
        }
        debug!(review_id = id, is_completed, "Updated review");
        self.get_review(id).await?.ok_or(CdiError::NotFound("Review"))
    }

    /// Incomplete, un-notified reviews whose publication is past due on `today`.
    pub async fn overdue_reviews(&self, today: NaiveDate) -> CdiResult<Vec<OverdueReview>> {
        let rows: Vec<OverdueRow> = sqlx::query_as(
            "SELECT r.id AS review_id, p.id AS publication_id, p.year_month, p.due_date, \
                    u.id AS user_id, u.name, u.email, u.technical_working_group \
             FROM reviews r \
             JOIN publications p ON p.id = r.publication_id \
             JOIN users u ON u.id = r.user_id \
             WHERE p.deleted_at IS NULL AND p.due_date < ? \
               AND r.is_completed = 0 AND r.completed_at IS NULL AND r.is_overdue_notified = 0 \
             ORDER BY r.id ASC",
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(rows
            .into_iter()
            .map(|row| OverdueReview {
                review_id: row.review_id,
                publication_id: row.publication_id,
                year_month: YearMonth::of(row.year_month),
                due_date: row.due_date,
                reviewer: ReviewerInfo {
                    id: row.user_id,
                    name: row.name,
                    email: row.email,
                    technical_working_group: row.technical_working_group,
                },
            })
            .collect())
    }

    pub async fn mark_overdue_notified(&self, review_id: i64) -> CdiResult<()> {
        sqlx::query("UPDATE reviews SET is_overdue_notified = 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(review_id)
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;
        info!(review_id, "Marked review as overdue-notified");
        Ok(())
    }
}

//! Response bodies assembled from storage rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use cdi_common::review::{publication_progress, review_progress};
use cdi_common::{CategoryValue, CdiError, CdiResult, PublicationStatus, ReviewerInfo, Suggestion, YearMonth};
use storage::{Publication, Review, Store};

/// A publication with its review progress (`"completed/total"`).
#[derive(Debug, Clone, Serialize)]
pub struct PublicationView {
    #[serde(flatten)]
    pub publication: Publication,
    pub progress_reviews: String,
}

impl PublicationView {
    pub async fn load(store: &Store, publication: Publication) -> CdiResult<Self> {
        let reviews = store.review_snapshots(publication.id).await?;
        Ok(Self {
            progress_reviews: publication_progress(&reviews),
            publication,
        })
    }
}

/// The publication fields a reviewer needs.
#[derive(Debug, Clone, Serialize)]
pub struct PublicationInfo {
    pub id: i64,
    pub year_month: YearMonth,
    pub due_date: NaiveDate,
    pub initial_values: Vec<CategoryValue>,
    pub status: PublicationStatus,
}

impl From<&Publication> for PublicationInfo {
    fn from(p: &Publication) -> Self {
        Self {
            id: p.id,
            year_month: p.year_month,
            due_date: p.due_date,
            initial_values: p.initial_values.clone(),
            status: p.status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub id: i64,
    pub publication_id: i64,
    pub publication: PublicationInfo,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<ReviewerInfo>,
    pub is_completed: bool,
    pub suggestion_values: Vec<Suggestion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress_review: String,
}

impl ReviewView {
    /// Build the detail view. An untouched review shows the initial values as
    /// unreviewed suggestions.
    pub async fn load(store: &Store, review: Review, user: Option<ReviewerInfo>) -> CdiResult<Self> {
        let publication = store
            .get_publication(review.publication_id)
            .await?
            .ok_or(CdiError::NotFound("Review"))?;
        let total = store.count_administrations().await?.max(0) as usize;

        let suggestion_values = if review.suggestion_values.is_empty() {
            publication
                .initial_values
                .iter()
                .map(Suggestion::from_initial)
                .collect()
        } else {
            review.suggestion_values
        };

        Ok(Self {
            id: review.id,
            publication_id: review.publication_id,
            publication: PublicationInfo::from(&publication),
            user_id: review.user_id,
            user,
            is_completed: review.is_completed,
            progress_review: review_progress(&suggestion_values, total),
            suggestion_values,
            created_at: review.created_at,
            updated_at: review.updated_at,
            completed_at: review.completed_at,
        })
    }
}

/// Row of a reviewer's assignment list.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewListItem {
    pub id: i64,
    pub publication_id: i64,
    pub year_month: YearMonth,
    pub due_date: NaiveDate,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub progress_review: String,
}

impl ReviewListItem {
    pub fn new(review: &Review, publication: &Publication, total_administrations: usize) -> Self {
        Self {
            id: review.id,
            publication_id: publication.id,
            year_month: publication.year_month,
            due_date: publication.due_date,
            completed_at: review.completed_at,
            is_completed: review.is_completed,
            progress_review: review_progress(&review.suggestion_values, total_administrations),
        }
    }
}

/// A published map in the public listing.
#[derive(Debug, Clone, Serialize)]
pub struct MapSummary {
    pub id: i64,
    pub cdi_geonode_id: i64,
    pub year_month: YearMonth,
    pub label: String,
    pub narrative: Option<String>,
    pub bulletin_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl From<&Publication> for MapSummary {
    fn from(p: &Publication) -> Self {
        Self {
            id: p.id,
            cdi_geonode_id: p.cdi_geonode_id,
            year_month: p.year_month,
            label: p.year_month.label(),
            narrative: p.narrative.clone(),
            bulletin_url: p.bulletin_url.clone(),
            published_at: p.published_at,
        }
    }
}

/// `{value, label}` option for the published-month picker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateOption {
    pub value: i64,
    pub label: String,
    pub year_month: YearMonth,
}

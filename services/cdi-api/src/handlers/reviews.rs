//! Review endpoints for admins and reviewers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use cdi_common::review::all_reviews_complete;
use cdi_common::values::parse_values;
use cdi_common::{CdiError, CdiResult, PublicationStatus, ReviewerInfo, Suggestion};
use storage::{Page, Review, Store};

use crate::auth::{AdminUser, ReviewerUser};
use crate::error::ApiResult;
use crate::pagination::{parse_page, Paginated};
use crate::state::AppState;
use crate::views::{ReviewListItem, ReviewView};

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateReviewRequest {
    #[serde(default)]
    pub suggestion_values: Option<Value>,
    #[serde(default)]
    pub is_completed: Option<bool>,
}

async fn load_review(store: &Store, id: i64) -> CdiResult<Review> {
    store.get_review(id).await?.ok_or(CdiError::NotFound("Review"))
}

/// A review owned by `user_id`; anyone else's review is reported missing.
async fn load_own_review(store: &Store, id: i64, user_id: i64) -> CdiResult<Review> {
    let review = load_review(store, id).await?;
    if review.user_id != user_id {
        return Err(CdiError::NotFound("Review"));
    }
    Ok(review)
}

/// GET /api/v1/admin/publication-review/:id
pub async fn admin_review_handler(
    _admin: AdminUser,
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ReviewView>> {
    let review = load_review(&state.store, id).await?;
    let user = state
        .store
        .get_user(review.user_id)
        .await?
        .map(|u| u.reviewer_info());
    Ok(Json(ReviewView::load(&state.store, review, user).await?))
}

/// GET /api/v1/admin/reviewers
pub async fn list_reviewers_handler(
    _admin: AdminUser,
    Extension(state): Extension<Arc<AppState>>,
) -> ApiResult<Json<Vec<ReviewerInfo>>> {
    let reviewers = state.store.list_reviewers().await?;
    Ok(Json(reviewers.iter().map(|u| u.reviewer_info()).collect()))
}

/// GET /api/v1/reviewer/reviews
pub async fn my_reviews_handler(
    ReviewerUser(user): ReviewerUser,
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Paginated<ReviewListItem>>> {
    let page = parse_page(params.page.as_deref())?;
    let listing = state.store.reviews_for_user(user.id, page).await?;
    let total_administrations = state.store.count_administrations().await?.max(0) as usize;

    let mut items = Vec::with_capacity(listing.items.len());
    for review in &listing.items {
        if let Some(publication) = state.store.get_publication(review.publication_id).await? {
            items.push(ReviewListItem::new(review, &publication, total_administrations));
        }
    }

    Ok(Json(Paginated::from_page(Page {
        items,
        total: listing.total,
        page: listing.page,
    })))
}

/// GET /api/v1/reviewer/review/:id
pub async fn my_review_handler(
    ReviewerUser(user): ReviewerUser,
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ReviewView>> {
    let review = load_own_review(&state.store, id, user.id).await?;
    Ok(Json(ReviewView::load(&state.store, review, None).await?))
}

/// PUT /api/v1/reviewer/review/:id
///
/// Completing the last pending review moves the publication to validation.
#[instrument(skip_all, fields(review_id = id, user_id = user.id))]
pub async fn update_my_review_handler(
    ReviewerUser(user): ReviewerUser,
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateReviewRequest>, JsonRejection>,
) -> ApiResult<Json<ReviewView>> {
    let Json(req) = payload?;
    let review = load_own_review(&state.store, id, user.id).await?;
    let publication = state
        .store
        .get_publication(review.publication_id)
        .await?
        .ok_or(CdiError::NotFound("Review"))?;

    if review.is_completed {
        return Err(CdiError::InvalidValues("This review has already been completed".to_string()).into());
    }
    if publication.status != PublicationStatus::InReview {
        return Err(CdiError::InvalidValues(format!(
            "The publication is {} and no longer accepts reviews",
            publication.status
        ))
        .into());
    }

    let suggestions: Vec<Suggestion> = match &req.suggestion_values {
        Some(raw) => parse_values("suggestion_values", raw)?,
        None if review.suggestion_values.is_empty() => publication
            .initial_values
            .iter()
            .map(Suggestion::from_initial)
            .collect(),
        None => review.suggestion_values.clone(),
    };
    let is_completed = req.is_completed.unwrap_or(false);

    let updated = state.store.update_review(id, &suggestions, is_completed).await?;

    if is_completed {
        metrics::counter!("cdi_reviews_completed_total").increment(1);
        let snapshots = state.store.review_snapshots(publication.id).await?;
        if all_reviews_complete(&snapshots) {
            let next = publication.status.transition_to(PublicationStatus::InValidation)?;
            state.store.set_publication_status(publication.id, next).await?;
            info!(publication_id = publication.id, "All reviews complete; publication in validation");
        }
    }

    Ok(Json(ReviewView::load(&state.store, updated, None).await?))
}

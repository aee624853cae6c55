//! Admin publication endpoints.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use cdi_common::review::{aggregate_reviews, apply_bulk_validation, ReviewSummary};
use cdi_common::time::parse_date;
use cdi_common::values::{deserialize_id, parse_values};
use cdi_common::{CategoryValue, CdiError, CdiResult, PublicationStatus, ReviewFilter, YearMonth};
use ingestion::enqueue_publication_jobs;
use storage::{NewPublication, Page, Publication, Role, Store};

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::pagination::{parse_flag, parse_id, parse_page, Paginated};
use crate::state::AppState;
use crate::views::PublicationView;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePublicationRequest {
    #[serde(deserialize_with = "deserialize_id")]
    pub cdi_geonode_id: i64,
    pub year_month: YearMonth,
    #[serde(default)]
    pub initial_values: Option<Value>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub reviewers: Vec<i64>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePublicationRequest {
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub initial_values: Option<Value>,
    #[serde(default)]
    pub validated_values: Option<Value>,
    #[serde(default)]
    pub narrative: Option<String>,
    #[serde(default)]
    pub bulletin_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewFilterParams {
    pub non_disputed: Option<String>,
    pub non_validated: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkValidationRequest {
    pub administration_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct BulkValidationResponse {
    #[serde(flatten)]
    pub publication: PublicationView,
    pub applied: Vec<i64>,
}

fn parse_status(raw: i64) -> CdiResult<PublicationStatus> {
    PublicationStatus::from_code(raw)
        .ok_or_else(|| CdiError::invalid("status", format!("\"{}\" is not a valid choice.", raw)))
}

/// A due date given by an admin must not lie in the past.
fn parse_due_date(raw: &str) -> CdiResult<chrono::NaiveDate> {
    let date = parse_date(raw).map_err(|e| CdiError::invalid("due_date", e.to_string()))?;
    if date < Utc::now().date_naive() {
        return Err(CdiError::invalid("due_date", "The date must be today or later."));
    }
    Ok(date)
}

async fn load_publication(store: &Store, id: i64) -> CdiResult<Publication> {
    store
        .get_publication(id)
        .await?
        .ok_or(CdiError::NotFound("Publication"))
}

/// Deduplicate reviewer ids and check each one holds the reviewer role.
async fn validate_reviewers(store: &Store, ids: &[i64]) -> CdiResult<Vec<i64>> {
    let ids: BTreeSet<i64> = ids.iter().copied().collect();
    if ids.is_empty() {
        return Err(CdiError::invalid("reviewers", "Please select at least one reviewer."));
    }
    for id in &ids {
        match store.get_user(*id).await? {
            Some(user) if user.role == Role::Reviewer => {}
            _ => {
                return Err(CdiError::invalid(
                    "reviewers",
                    format!("User {} is not a reviewer.", id),
                ))
            }
        }
    }
    Ok(ids.into_iter().collect())
}

/// GET /api/v1/admin/publications
pub async fn list_publications_handler(
    _admin: AdminUser,
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Paginated<PublicationView>>> {
    let page = parse_page(params.page.as_deref())?;
    let status = parse_id("status", params.status.as_deref())?
        .map(parse_status)
        .transpose()?;

    let listing = state.store.list_publications(page, status).await?;
    let mut views = Vec::with_capacity(listing.items.len());
    for publication in listing.items {
        views.push(PublicationView::load(&state.store, publication).await?);
    }

    Ok(Json(Paginated::from_page(Page {
        items: views,
        total: listing.total,
        page: listing.page,
    })))
}

/// POST /api/v1/admin/publications
#[instrument(skip_all, fields(admin = admin.id))]
pub async fn create_publication_handler(
    AdminUser(admin): AdminUser,
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<CreatePublicationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PublicationView>)> {
    let Json(req) = payload?;

    let due_date = match req.due_date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_due_date(raw)?,
        None => return Err(CdiError::MissingParameter("due_date".into()).into()),
    };
    let reviewer_ids = validate_reviewers(&state.store, &req.reviewers).await?;
    let initial_values: Vec<CategoryValue> = match &req.initial_values {
        Some(raw) if !raw.is_null() => parse_values("initial_values", raw)?,
        _ => Vec::new(),
    };

    let publication = state
        .store
        .create_publication(&NewPublication {
            year_month: req.year_month,
            cdi_geonode_id: req.cdi_geonode_id,
            initial_values,
            validated_values: None,
            due_date,
            status: PublicationStatus::InReview,
            published_at: None,
            reviewer_ids,
        })
        .await?;

    let mut templates = state.templates.clone();
    if let Some(subject) = req.subject.filter(|s| !s.trim().is_empty()) {
        templates.review_request_subject = subject;
    }
    if let Some(message) = req.message.filter(|s| !s.trim().is_empty()) {
        templates.review_request_body = message;
    }
    let jobs = enqueue_publication_jobs(
        &state.store,
        &templates,
        &publication,
        req.download_url.as_deref(),
    )
    .await?;

    metrics::counter!("cdi_publications_created_total").increment(1);
    info!(
        publication_id = publication.id,
        year_month = %publication.year_month,
        jobs = jobs.len(),
        "Publication created"
    );

    let view = PublicationView::load(&state.store, publication).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/admin/publication/:id
pub async fn get_publication_handler(
    _admin: AdminUser,
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PublicationView>> {
    let publication = load_publication(&state.store, id).await?;
    Ok(Json(PublicationView::load(&state.store, publication).await?))
}

/// Apply a partial update, enforcing the status rules.
pub fn apply_update(mut publication: Publication, req: UpdatePublicationRequest) -> CdiResult<Publication> {
    if let Some(raw) = req.due_date.as_deref() {
        publication.due_date = parse_due_date(raw)?;
    }
    if let Some(raw) = &req.initial_values {
        publication.initial_values = parse_values("initial_values", raw)?;
    }
    if let Some(raw) = &req.validated_values {
        publication.validated_values = if raw.is_null() {
            None
        } else {
            Some(parse_values("validated_values", raw)?)
        };
    }
    if let Some(narrative) = req.narrative {
        publication.narrative = Some(narrative);
    }
    if let Some(url) = req.bulletin_url {
        publication.bulletin_url = Some(url);
    }

    if let Some(code) = req.status {
        let next = publication.status.transition_to(parse_status(code)?)?;
        if next == PublicationStatus::Published {
            let has_values = publication
                .validated_values
                .as_ref()
                .is_some_and(|v| !v.is_empty());
            if !has_values {
                return Err(CdiError::InvalidValues(
                    "validated_values must be set before publishing".to_string(),
                ));
            }
            publication.published_at.get_or_insert_with(Utc::now);
        }
        publication.status = next;
    }

    Ok(publication)
}

/// PUT /api/v1/admin/publication/:id
#[instrument(skip(_admin, state, payload))]
pub async fn update_publication_handler(
    _admin: AdminUser,
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdatePublicationRequest>, JsonRejection>,
) -> ApiResult<Json<PublicationView>> {
    let Json(req) = payload?;
    let publication = load_publication(&state.store, id).await?;
    let previous = publication.status;

    let updated = apply_update(publication, req)?;
    let saved = state.store.save_publication(&updated).await?;
    if saved.status != previous {
        info!(publication_id = id, from = %previous, to = %saved.status, "Publication status changed");
    }
    Ok(Json(PublicationView::load(&state.store, saved).await?))
}

/// DELETE /api/v1/admin/publication/:id
pub async fn delete_publication_handler(
    _admin: AdminUser,
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !state.store.soft_delete_publication(id).await? {
        return Err(CdiError::NotFound("Publication").into());
    }
    info!(publication_id = id, "Publication deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/admin/publication-reviews/:id
pub async fn publication_reviews_handler(
    _admin: AdminUser,
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<ReviewFilterParams>,
) -> ApiResult<Json<ReviewSummary>> {
    let filter = ReviewFilter {
        non_disputed: parse_flag("non_disputed", params.non_disputed.as_deref())?,
        non_validated: parse_flag("non_validated", params.non_validated.as_deref())?,
    };
    let publication = load_publication(&state.store, id).await?;
    let reviews = state.store.review_snapshots(id).await?;

    Ok(Json(aggregate_reviews(
        publication.id,
        publication.validated_values.as_deref(),
        &reviews,
        filter,
    )))
}

/// POST /api/v1/admin/publication/:id/bulk-validation
#[instrument(skip(_admin, state, payload))]
pub async fn bulk_validation_handler(
    _admin: AdminUser,
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<BulkValidationRequest>, JsonRejection>,
) -> ApiResult<Json<BulkValidationResponse>> {
    let Json(req) = payload?;
    let mut publication = load_publication(&state.store, id).await?;
    let reviews = state.store.review_snapshots(id).await?;

    let (values, applied) = apply_bulk_validation(
        publication.validated_values.as_deref(),
        &publication.initial_values,
        &reviews,
        &req.administration_ids,
    );
    publication.validated_values = Some(values);
    let saved = state.store.save_publication(&publication).await?;
    info!(publication_id = id, applied = applied.len(), "Bulk validation applied");

    Ok(Json(BulkValidationResponse {
        publication: PublicationView::load(&state.store, saved).await?,
        applied,
    }))
}

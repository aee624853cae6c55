//! Public endpoints for published maps.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::{info, instrument};

use cdi_common::{CdiError, CdiResult, YearMonth};
use renderer::{export_map, ExportFormat, MapDocument};
use storage::{Publication, Store};

use crate::error::ApiResult;
use crate::pagination::{parse_id, parse_page, Paginated};
use crate::state::AppState;
use crate::views::{DateOption, MapSummary};

#[derive(Debug, Default, Deserialize)]
pub struct MapListParams {
    pub page: Option<String>,
    pub left_date: Option<String>,
    pub right_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    pub export_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DatesParams {
    pub exclude_id: Option<String>,
}

fn parse_month(name: &str, raw: Option<&str>) -> CdiResult<Option<YearMonth>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse::<YearMonth>()
            .map(Some)
            .map_err(|e| CdiError::invalid(name, e.to_string())),
    }
}

async fn load_published(store: &Store, id: i64) -> CdiResult<Publication> {
    store
        .get_published(id)
        .await?
        .ok_or(CdiError::NotFound("Publication"))
}

/// GET /api/v1/maps
pub async fn list_maps_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<MapListParams>,
) -> ApiResult<Json<Paginated<MapSummary>>> {
    let page = parse_page(params.page.as_deref())?;
    let left = parse_month("left_date", params.left_date.as_deref())?;
    let right = parse_month("right_date", params.right_date.as_deref())?;

    let listing = state
        .store
        .list_published(page, left.map(|m| m.first_day()), right.map(|m| m.first_day()))
        .await?;
    Ok(Json(Paginated::from_page(listing.map(|p| MapSummary::from(&p)))))
}

/// GET /api/v1/map/:id
pub async fn map_detail_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Publication>> {
    Ok(Json(load_published(&state.store, id).await?))
}

/// GET /api/v1/map/:id/export?export_type=
///
/// Rendering runs on the blocking pool.
#[instrument(skip(state, params))]
pub async fn export_map_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<ExportParams>,
) -> ApiResult<Response> {
    let format = match params.export_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw.parse::<ExportFormat>()?,
        None => ExportFormat::default(),
    };
    let publication = load_published(&state.store, id).await?;

    let boundaries = state.boundaries.clone();
    let options = state.render;
    let file = tokio::task::spawn_blocking(move || {
        let values = publication.validated_values.unwrap_or_default();
        let doc = MapDocument::new(publication.year_month, &boundaries, &values);
        export_map(format, &doc, &options)
    })
    .await
    .map_err(|e| CdiError::InternalError(format!("export task failed: {}", e)))??;

    metrics::counter!("cdi_exports_total", "format" => format.as_str()).increment(1);
    info!(publication_id = id, format = %format, bytes = file.bytes.len(), "Map exported");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.bytes,
    )
        .into_response())
}

/// GET /api/v1/dates
pub async fn dates_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<DatesParams>,
) -> ApiResult<Json<Vec<DateOption>>> {
    let exclude = parse_id("exclude_id", params.exclude_id.as_deref())?;
    let dates = state.store.published_dates(exclude).await?;
    Ok(Json(
        dates
            .into_iter()
            .map(|(id, year_month)| DateOption {
                value: id,
                label: year_month.label(),
                year_month,
            })
            .collect(),
    ))
}

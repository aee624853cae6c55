//! Admin view of the GeoNode catalog.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    Json,
};
use serde::Deserialize;
use tracing::instrument;

use cdi_common::{CdiError, PublicationStatus};
use ingestion::{annotate, CatalogEntry, ResourceQuery};

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::pagination::{parse_id, parse_page, Paginated};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CatalogParams {
    pub page: Option<String>,
    pub status: Option<String>,
    pub id: Option<String>,
}

/// GET /api/v1/admin/cdi-geonode
///
/// Resources are annotated with the local publication, if any. `status`
/// keeps only resources whose publication is in that state.
#[instrument(skip(_admin, state, params))]
pub async fn cdi_geonode_handler(
    _admin: AdminUser,
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<CatalogParams>,
) -> ApiResult<Json<Paginated<CatalogEntry>>> {
    let page = parse_page(params.page.as_deref())?;
    let pk = parse_id("id", params.id.as_deref())?;
    let status = parse_id("status", params.status.as_deref())?
        .map(|code| {
            PublicationStatus::from_code(code)
                .ok_or_else(|| CdiError::invalid("status", format!("\"{}\" is not a valid choice.", code)))
        })
        .transpose()?;

    let listing = state
        .catalog
        .list_resources(ResourceQuery {
            page: page as u32,
            pk,
        })
        .await?;

    let pks: Vec<i64> = listing.resources.iter().map(|r| r.pk).collect();
    let matches: Vec<_> = state
        .store
        .publications_by_geonode_ids(&pks)
        .await?
        .iter()
        .map(|p| (p.cdi_geonode_id, p.id, p.status))
        .collect();

    let mut entries = annotate(listing.resources, &matches);
    if let Some(status) = status {
        entries.retain(|e| e.status == Some(status));
    }

    Ok(Json(Paginated::external(
        page,
        listing.total,
        listing.page_size,
        entries,
    )))
}

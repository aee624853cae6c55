use std::sync::Arc;

use axum::{extract::Extension, Json};

use storage::Administration;

use crate::error::ApiResult;
use crate::state::AppState;

/// GET /api/v1/administrations
pub async fn list_administrations_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> ApiResult<Json<Vec<Administration>>> {
    Ok(Json(state.store.list_administrations().await?))
}

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    Json,
};

use cdi_common::CdiError;
use storage::Job;

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// GET /api/v1/job/:id
pub async fn job_status_handler(
    _admin: AdminUser,
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Job>> {
    let job = state.store.get_job(id).await?.ok_or(CdiError::NotFound("Job"))?;
    Ok(Json(job))
}

//! Job payloads and the helpers that enqueue them.

use serde::{Deserialize, Serialize};
use tracing::info;

use cdi_common::CdiResult;
use storage::{Job, JobType, Publication, Store};

use crate::notify::{Notification, NotificationTemplates, TemplateVars};

/// Payload of a `ComputeInitialValues` job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeInitialValuesInfo {
    pub publication_id: i64,
    pub download_url: String,
    pub filename: String,
    /// Historical import: validated values are copied from the computed ones.
    #[serde(default)]
    pub backfill: bool,
}

impl ComputeInitialValuesInfo {
    pub fn new(publication_id: i64, download_url: &str, backfill: bool) -> Self {
        Self {
            publication_id,
            download_url: download_url.to_string(),
            filename: format!("cdi_publication_{}.tif", publication_id),
            backfill,
        }
    }
}

pub async fn enqueue_initial_values(
    store: &Store,
    info: &ComputeInitialValuesInfo,
) -> CdiResult<Job> {
    store
        .enqueue_job(JobType::ComputeInitialValues, &serde_json::to_value(info)?)
        .await
}

pub async fn enqueue_notification(
    store: &Store,
    job_type: JobType,
    notification: &Notification,
) -> CdiResult<Job> {
    store
        .enqueue_job(job_type, &serde_json::to_value(notification)?)
        .await
}

/// Queue the jobs that follow a new publication: one review request per
/// reviewer, and the zonal computation when values still have to be derived
/// from the raster.
pub async fn enqueue_publication_jobs(
    store: &Store,
    templates: &NotificationTemplates,
    publication: &Publication,
    download_url: Option<&str>,
) -> CdiResult<Vec<Job>> {
    let mut jobs = Vec::new();

    if let Some(url) = download_url.filter(|u| !u.is_empty()) {
        if publication.initial_values.is_empty() {
            let info = ComputeInitialValuesInfo::new(publication.id, url, false);
            jobs.push(enqueue_initial_values(store, &info).await?);
        }
    }

    for review in store.review_snapshots(publication.id).await? {
        let vars = TemplateVars {
            reviewer_name: review.user.name.clone(),
            year_month: publication.year_month,
            due_date: publication.due_date,
            review_id: review.id,
        };
        let message = templates.review_request(&review.user.email, &vars);
        jobs.push(enqueue_notification(store, JobType::ReviewRequest, &message).await?);
    }

    info!(
        publication_id = publication.id,
        jobs = jobs.len(),
        "Queued publication jobs"
    );
    Ok(jobs)
}

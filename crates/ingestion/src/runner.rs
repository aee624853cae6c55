//! Background job runner.
//!
//! Polls the `jobs` table, executes one job at a time and records the
//! outcome. Failed jobs are retried until `max_attempts` is spent.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use metrics::{counter, histogram};
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use cdi_common::{BoundarySet, DroughtCategory};
use storage::{Job, JobStatus, JobType, Store};
use zonal_stats::{read_geotiff_file, zonal_categories, ZonalOptions};

use crate::download::RasterFetcher;
use crate::jobs::ComputeInitialValuesInfo;
use crate::notify::{Notification, Notifier};
use crate::sync::backfill_published_at;

/// Result of one claimed job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub job_id: i64,
    pub job_type: JobType,
    pub status: JobStatus,
}

pub struct JobRunner {
    store: Store,
    fetcher: Arc<dyn RasterFetcher>,
    notifier: Arc<dyn Notifier>,
    boundaries: Arc<BoundarySet>,
    zonal: ZonalOptions,
    max_attempts: i64,
    poll_interval: Duration,
}

impl JobRunner {
    pub fn new(
        store: Store,
        fetcher: Arc<dyn RasterFetcher>,
        notifier: Arc<dyn Notifier>,
        boundaries: Arc<BoundarySet>,
    ) -> Self {
        Self {
            store,
            fetcher,
            notifier,
            boundaries,
            zonal: ZonalOptions::default(),
            max_attempts: 3,
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_zonal_options(mut self, options: ZonalOptions) -> Self {
        self.zonal = options;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i64) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Poll forever.
    pub async fn run(self) {
        match self.store.requeue_stale_jobs().await {
            Ok(0) => {}
            Ok(n) => info!(requeued = n, "Requeued jobs left in progress"),
            Err(e) => warn!(error = %e, "Failed to requeue stale jobs"),
        }

        info!(poll_ms = self.poll_interval.as_millis() as u64, "Job runner started");
        loop {
            match self.run_once().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => error!(error = %e, "Job runner error"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Run jobs until none are pending.
    pub async fn drain(&self) -> Result<Vec<JobOutcome>> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.run_once().await? {
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Claim and execute the oldest pending job.
    pub async fn run_once(&self) -> Result<Option<JobOutcome>> {
        let Some(job) = self.store.claim_next_job().await? else {
            return Ok(None);
        };

        let started = Instant::now();
        let status = match self.execute(&job).await {
            Ok(result) => {
                self.store.complete_job(job.id, &result).await?;
                JobStatus::Done
            }
            Err(e) => {
                self.store
                    .fail_job(job.id, &format!("{:#}", e), self.max_attempts)
                    .await?
            }
        };

        let job_type = job_type_label(job.job_type);
        counter!("cdi_jobs_total", "type" => job_type, "status" => status_label(status))
            .increment(1);
        histogram!("cdi_job_duration_seconds", "type" => job_type)
            .record(started.elapsed().as_secs_f64());

        Ok(Some(JobOutcome {
            job_id: job.id,
            job_type: job.job_type,
            status,
        }))
    }

    #[instrument(skip(self, job), fields(job_id = job.id, job_type = ?job.job_type, attempt = job.attempt))]
    async fn execute(&self, job: &Job) -> Result<Value> {
        match job.job_type {
            JobType::ComputeInitialValues => {
                let info: ComputeInitialValuesInfo = serde_json::from_value(job.info.clone())
                    .context("Invalid ComputeInitialValues payload")?;
                self.compute_initial_values(&info).await
            }
            JobType::ReviewRequest | JobType::ReviewOverdue => {
                let message: Notification = serde_json::from_value(job.info.clone())
                    .context("Invalid notification payload")?;
                self.notifier.send(&message).await?;
                Ok(json!({ "recipient": message.recipient }))
            }
        }
    }

    /// Download the raster, run the zonal pipeline and store the values.
    async fn compute_initial_values(&self, info: &ComputeInitialValuesInfo) -> Result<Value> {
        let publication = self
            .store
            .get_publication(info.publication_id)
            .await?
            .ok_or_else(|| anyhow!("Publication {} no longer exists", info.publication_id))?;

        let path = self
            .fetcher
            .fetch(&info.download_url, &info.filename)
            .await
            .with_context(|| format!("Failed to download {}", info.download_url))?;

        let boundaries = Arc::clone(&self.boundaries);
        let options = self.zonal;
        let raster_path = path.clone();
        let values = tokio::task::spawn_blocking(move || -> Result<_> {
            let raster = read_geotiff_file(&raster_path)?;
            Ok(zonal_categories(&raster, &boundaries, &options))
        })
        .await
        .context("Zonal task panicked")?
        .with_context(|| format!("Failed to process raster {}", path.display()))?;

        self.store.set_initial_values(publication.id, &values).await?;

        let no_data = values
            .iter()
            .filter(|v| v.category == Some(DroughtCategory::NoData))
            .count();
        let mut validated = false;
        if info.backfill && publication.validated_values.as_ref().map_or(true, Vec::is_empty) {
            self.store
                .publish_validated_values(
                    publication.id,
                    &values,
                    backfill_published_at(publication.due_date),
                )
                .await?;
            validated = true;
        }

        info!(
            publication_id = publication.id,
            regions = values.len(),
            no_data,
            validated,
            "Computed initial values"
        );
        Ok(json!({
            "publication_id": publication.id,
            "regions": values.len(),
            "no_data": no_data,
            "validated": validated,
        }))
    }
}

fn job_type_label(job_type: JobType) -> &'static str {
    match job_type {
        JobType::ComputeInitialValues => "compute_initial_values",
        JobType::ReviewRequest => "review_request",
        JobType::ReviewOverdue => "review_overdue",
    }
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "retry",
        JobStatus::OnProgress => "on_progress",
        JobStatus::Failed => "failed",
        JobStatus::Done => "done",
    }
}

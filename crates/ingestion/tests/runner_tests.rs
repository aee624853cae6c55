//! Job runner and overdue check tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use cdi_common::{DroughtCategory, PublicationStatus, YearMonth};
use ingestion::jobs::{enqueue_initial_values, ComputeInitialValuesInfo};
use ingestion::{
    check_overdue, enqueue_publication_jobs, JobRunner, MemoryNotifier, NotificationTemplates,
    RasterFetcher,
};
use storage::{JobStatus, JobType, NewPublication, NewUser, Role, Store};
use tempfile::TempDir;
use test_utils::{strip_boundaries, write_strip_geotiff};

/// Serves the strip GeoTIFF from a temp dir.
struct LocalFetcher {
    dir: TempDir,
    calls: AtomicUsize,
}

impl LocalFetcher {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RasterFetcher for LocalFetcher {
    async fn fetch(&self, _url: &str, filename: &str) -> anyhow::Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.path().join(filename);
        write_strip_geotiff(&path)?;
        Ok(path)
    }
}

struct BrokenFetcher;

#[async_trait]
impl RasterFetcher for BrokenFetcher {
    async fn fetch(&self, url: &str, _filename: &str) -> anyhow::Result<PathBuf> {
        anyhow::bail!("connection reset fetching {}", url)
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn setup() -> (Store, i64) {
    let store = Store::open_memory().await.unwrap();
    let reviewer = store
        .create_user(&NewUser {
            name: "Sipho".into(),
            email: "sipho@example.org".into(),
            role: Role::Reviewer,
            technical_working_group: None,
            api_token: None,
        })
        .await
        .unwrap();
    let publication = store
        .create_publication(&NewPublication {
            year_month: YearMonth::new(2025, 1).unwrap(),
            cdi_geonode_id: 7,
            initial_values: vec![],
            validated_values: None,
            due_date: date(2025, 2, 10),
            status: PublicationStatus::InReview,
            published_at: None,
            reviewer_ids: vec![reviewer.id],
        })
        .await
        .unwrap();
    (store, publication.id)
}

fn runner(store: &Store, fetcher: Arc<dyn RasterFetcher>, notifier: Arc<MemoryNotifier>) -> JobRunner {
    JobRunner::new(store.clone(), fetcher, notifier, Arc::new(strip_boundaries())).with_max_attempts(2)
}

// ============================================================================
// Runner
// ============================================================================

#[tokio::test]
async fn test_publication_jobs_compute_and_notify() {
    let (store, publication_id) = setup().await;
    let publication = store.get_publication(publication_id).await.unwrap().unwrap();
    let templates = NotificationTemplates::default();
    let jobs = enqueue_publication_jobs(&store, &templates, &publication, Some("http://geonode/cdi.tif"))
        .await
        .unwrap();
    assert_eq!(jobs.len(), 2);

    let fetcher = Arc::new(LocalFetcher::new());
    let notifier = Arc::new(MemoryNotifier::default());
    let outcomes = runner(&store, fetcher.clone(), notifier.clone()).drain().await.unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.status == JobStatus::Done));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

    let publication = store.get_publication(publication_id).await.unwrap().unwrap();
    let categories: Vec<_> = publication.initial_values.iter().map(|v| v.category).collect();
    assert_eq!(
        categories,
        vec![
            Some(DroughtCategory::D4),
            Some(DroughtCategory::D1),
            Some(DroughtCategory::Normal)
        ]
    );
    assert!(publication.validated_values.is_none());

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "sipho@example.org");
    assert_eq!(sent[0].subject, "CDI map review request: January 2025");

    let compute = store.get_job(jobs[0].id).await.unwrap().unwrap();
    assert_eq!(compute.result.unwrap()["regions"], 3);
}

#[tokio::test]
async fn test_backfill_job_validates_values() {
    let (store, publication_id) = setup().await;
    let info = ComputeInitialValuesInfo::new(publication_id, "http://geonode/cdi.tif", true);
    enqueue_initial_values(&store, &info).await.unwrap();

    runner(&store, Arc::new(LocalFetcher::new()), Arc::new(MemoryNotifier::default()))
        .drain()
        .await
        .unwrap();

    let publication = store.get_publication(publication_id).await.unwrap().unwrap();
    assert_eq!(publication.validated_values.as_ref(), Some(&publication.initial_values));
    assert_eq!(publication.status, PublicationStatus::Published);
    assert_eq!(
        publication.published_at.map(|t| t.date_naive()),
        Some(publication.due_date)
    );
}

#[tokio::test]
async fn test_failed_download_retries_then_fails() {
    let (store, publication_id) = setup().await;
    let info = ComputeInitialValuesInfo::new(publication_id, "http://geonode/cdi.tif", false);
    let job = enqueue_initial_values(&store, &info).await.unwrap();

    let outcomes = runner(&store, Arc::new(BrokenFetcher), Arc::new(MemoryNotifier::default()))
        .drain()
        .await
        .unwrap();

    let statuses: Vec<_> = outcomes.iter().map(|o| o.status).collect();
    assert_eq!(statuses, vec![JobStatus::Pending, JobStatus::Failed]);

    let failed = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(failed.attempt, 2);
    let error = failed.result.unwrap()["error"].as_str().unwrap().to_string();
    assert!(error.contains("connection reset"));
}

#[tokio::test]
async fn test_deleted_publication_fails_job() {
    let (store, publication_id) = setup().await;
    let info = ComputeInitialValuesInfo::new(publication_id, "http://geonode/cdi.tif", false);
    enqueue_initial_values(&store, &info).await.unwrap();
    store.soft_delete_publication(publication_id).await.unwrap();

    let outcomes = runner(&store, Arc::new(LocalFetcher::new()), Arc::new(MemoryNotifier::default()))
        .with_max_attempts(1)
        .drain()
        .await
        .unwrap();
    assert_eq!(outcomes[0].job_type, JobType::ComputeInitialValues);
    assert_eq!(outcomes[0].status, JobStatus::Failed);
}

// ============================================================================
// Overdue reminders
// ============================================================================

#[tokio::test]
async fn test_overdue_reminders_sent_once() {
    let (store, _) = setup().await;
    let templates = NotificationTemplates::default();

    assert_eq!(check_overdue(&store, &templates, date(2025, 2, 10)).await.unwrap(), 0);
    assert_eq!(check_overdue(&store, &templates, date(2025, 2, 11)).await.unwrap(), 1);
    assert_eq!(check_overdue(&store, &templates, date(2025, 2, 12)).await.unwrap(), 0);

    let notifier = Arc::new(MemoryNotifier::default());
    runner(&store, Arc::new(BrokenFetcher), notifier.clone())
        .drain()
        .await
        .unwrap();

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Overdue CDI map review: January 2025");
    assert!(sent[0].body.contains("10 February 2025"));
}

//! Data ingestion and background work for the CDI map service.
//!
//! # Architecture
//!
//! Shared by the `cdi-api` service and the `cdi-admin` CLI:
//!
//! - Application configuration (YAML + environment overrides)
//! - GeoNode catalog client and catalog sync/backfill
//! - Resumable raster downloads
//! - Job runner: zonal computation of initial values, reviewer notifications
//! - Overdue review reminders

pub mod config;
pub mod download;
pub mod geonode;
pub mod jobs;
pub mod notify;
pub mod overdue;
pub mod runner;
pub mod sync;

pub use config::{AppConfig, DEFAULT_CONFIG_PATH};
pub use download::{DownloadConfig, DownloadManager, RasterFetcher};
pub use geonode::{annotate, CatalogEntry, CatalogSource, CdiResource, GeonodeClient, ResourcePage, ResourceQuery};
pub use jobs::{enqueue_publication_jobs, ComputeInitialValuesInfo};
pub use notify::{LogNotifier, MemoryNotifier, Notification, NotificationTemplates, Notifier};
pub use overdue::check_overdue;
pub use runner::{JobOutcome, JobRunner};
pub use sync::{fetch_all_resources, sync_catalog, SyncReport};

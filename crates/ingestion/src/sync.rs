//! Catalog synchronisation.
//!
//! Walks every page of the GeoNode listing and creates a publication for
//! each CDI raster that does not have one yet.
//!
//! - Regular sync: new publications start `InReview` with every registered
//!   reviewer assigned, and review requests are queued.
//! - Backfill: historical maps are imported `InValidation` and published by
//!   their compute job once values exist. Resources without a download link
//!   are skipped. Existing publications without validated values adopt their
//!   initial values and are published.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use cdi_common::time::default_due_date;
use cdi_common::{PublicationStatus, YearMonth};
use storage::{NewPublication, Publication, Store};

use crate::geonode::{CatalogSource, CdiResource, ResourceQuery};
use crate::jobs::{enqueue_initial_values, enqueue_publication_jobs, ComputeInitialValuesInfo};
use crate::notify::NotificationTemplates;

/// Upper bound on pages walked in one sync.
const MAX_PAGES: u32 = 1000;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub scanned: usize,
    pub created: usize,
    pub validated: usize,
    pub skipped: usize,
}

/// Fetch every resource in the catalog, newest first.
pub async fn fetch_all_resources(catalog: &dyn CatalogSource) -> Result<Vec<CdiResource>> {
    let mut resources = Vec::new();
    for page in 1..=MAX_PAGES {
        let listing = catalog
            .list_resources(ResourceQuery { page, pk: None })
            .await?;
        let has_next = listing.has_next();
        resources.extend(listing.resources);
        if !has_next {
            break;
        }
    }
    Ok(resources)
}

#[instrument(skip(store, catalog, templates))]
pub async fn sync_catalog(
    store: &Store,
    catalog: &dyn CatalogSource,
    templates: &NotificationTemplates,
    backfill: bool,
) -> Result<SyncReport> {
    let resources = fetch_all_resources(catalog).await?;
    let mut report = SyncReport {
        scanned: resources.len(),
        ..Default::default()
    };

    let reviewer_ids: Vec<i64> = if backfill {
        Vec::new()
    } else {
        store.list_reviewers().await?.iter().map(|u| u.id).collect()
    };

    for resource in &resources {
        if let Some(existing) = store.find_publication_by_geonode_id(resource.pk).await? {
            if backfill && adopt_initial_values(store, existing).await? {
                report.validated += 1;
            } else {
                report.skipped += 1;
            }
            continue;
        }

        let Some(date) = resource.dataset_date() else {
            warn!(pk = resource.pk, "Resource has no usable date, skipping");
            report.skipped += 1;
            continue;
        };
        let download_url = resource.download_url.as_deref().filter(|u| !u.is_empty());
        if backfill && download_url.is_none() {
            warn!(pk = resource.pk, "Historical resource has no download link, skipping");
            report.skipped += 1;
            continue;
        }
        let due_date = default_due_date(date);

        let new = NewPublication {
            year_month: YearMonth::of(date),
            cdi_geonode_id: resource.pk,
            initial_values: Vec::new(),
            validated_values: None,
            due_date,
            status: if backfill {
                PublicationStatus::InValidation
            } else {
                PublicationStatus::InReview
            },
            published_at: None,
            reviewer_ids: reviewer_ids.clone(),
        };
        let publication = store.create_publication(&new).await?;

        match download_url {
            Some(url) if backfill => {
                let info = ComputeInitialValuesInfo::new(publication.id, url, true);
                enqueue_initial_values(store, &info).await?;
            }
            _ => {
                enqueue_publication_jobs(store, templates, &publication, download_url).await?;
            }
        }
        report.created += 1;
    }

    info!(
        scanned = report.scanned,
        created = report.created,
        validated = report.validated,
        skipped = report.skipped,
        backfill,
        "Catalog sync complete"
    );
    Ok(report)
}

/// Publication date given to historical maps: midnight on the due date,
/// capped at now.
pub(crate) fn backfill_published_at(due_date: NaiveDate) -> DateTime<Utc> {
    due_date.and_time(NaiveTime::MIN).and_utc().min(Utc::now())
}

/// Promote initial values to validated values on a historical publication
/// and publish it.
async fn adopt_initial_values(store: &Store, publication: Publication) -> Result<bool> {
    let has_validated = publication
        .validated_values
        .as_ref()
        .map_or(false, |v| !v.is_empty());
    if publication.deleted_at.is_some() || has_validated || publication.initial_values.is_empty() {
        return Ok(false);
    }

    store
        .publish_validated_values(
            publication.id,
            &publication.initial_values,
            backfill_published_at(publication.due_date),
        )
        .await?;
    Ok(true)
}

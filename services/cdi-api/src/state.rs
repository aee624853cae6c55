//! Application state shared by all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{info, warn};

use cdi_common::BoundarySet;
use ingestion::{AppConfig, CatalogSource, GeonodeClient, NotificationTemplates};
use renderer::RenderOptions;
use storage::{Administration, Store};

pub struct AppState {
    pub store: Store,
    pub catalog: Arc<dyn CatalogSource>,
    pub boundaries: Arc<BoundarySet>,
    pub templates: NotificationTemplates,
    pub render: RenderOptions,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Connect to the database, load boundaries and build the catalog client.
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let store = Store::connect(&config.database_url)
            .await
            .context("Failed to open database")?;
        store.migrate().await.context("Failed to run migrations")?;

        let boundaries = if config.boundaries_path.exists() {
            let set = BoundarySet::load(&config.boundaries_path).with_context(|| {
                format!("Failed to load boundaries from {:?}", config.boundaries_path)
            })?;
            let seeded = store
                .upsert_administrations(&Administration::from_boundaries(&set))
                .await?;
            info!(regions = set.len(), seeded, "Loaded administrative boundaries");
            set
        } else {
            warn!(
                path = %config.boundaries_path.display(),
                "Boundary file not found; exports and zonal jobs will be empty"
            );
            BoundarySet::default()
        };

        let catalog = GeonodeClient::new(config.geonode.clone())?;

        Ok(Self {
            store,
            catalog: Arc::new(catalog),
            boundaries: Arc::new(boundaries),
            templates: config.notifications.clone(),
            render: RenderOptions {
                image_width: config.export.image_width,
                padding: config.export.padding,
            },
            prometheus: None,
        })
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

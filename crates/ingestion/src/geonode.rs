//! GeoNode catalog client.
//!
//! Lists CDI rasters through the GeoNode v2 REST API:
//!
//! ```text
//! GET {base}/api/v2/resources?filter{category.identifier}=cdi
//!     &filter{subtype}=raster&page=N&page_size=M&sort[]=-date
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use cdi_common::time::parse_date;
use cdi_common::values::deserialize_id;
use cdi_common::{CdiError, CdiResult, PublicationStatus, YearMonth};

use crate::config::GeonodeConfig;

/// A CDI raster published in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdiResource {
    #[serde(deserialize_with = "deserialize_id")]
    pub pk: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail_url: Option<String>,
    #[serde(default)]
    pub embed_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default, skip_serializing)]
    pub date: Option<String>,
    #[serde(default)]
    pub year_month: Option<YearMonth>,
}

impl CdiResource {
    /// Dataset date, falling back to the upload time.
    pub fn dataset_date(&self) -> Option<chrono::NaiveDate> {
        self.date
            .as_deref()
            .and_then(|d| parse_date(d).ok())
            .or_else(|| self.created.as_deref().and_then(|c| parse_date(c).ok()))
    }

    fn with_year_month(mut self) -> Self {
        if self.year_month.is_none() {
            self.year_month = self.dataset_date().map(YearMonth::of);
        }
        self
    }
}

/// One page of the resource listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcePage {
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub page_size: i64,
    #[serde(default)]
    pub resources: Vec<CdiResource>,
}

impl ResourcePage {
    pub fn has_next(&self) -> bool {
        !self.resources.is_empty() && self.page * self.page_size.max(1) < self.total
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceQuery {
    pub page: u32,
    /// Restrict to a single resource.
    pub pk: Option<i64>,
}

/// Source of CDI raster metadata.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn list_resources(&self, query: ResourceQuery) -> CdiResult<ResourcePage>;
}

/// A resource joined with its local publication, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub resource: CdiResource,
    pub publication_id: Option<i64>,
    pub status: Option<PublicationStatus>,
}

/// Attach `(pk, publication_id, status)` matches to each resource.
pub fn annotate(
    resources: Vec<CdiResource>,
    publications: &[(i64, i64, PublicationStatus)],
) -> Vec<CatalogEntry> {
    resources
        .into_iter()
        .map(|resource| {
            let found = publications.iter().find(|(pk, _, _)| *pk == resource.pk);
            CatalogEntry {
                publication_id: found.map(|(_, id, _)| *id),
                status: found.map(|(_, _, status)| *status),
                resource,
            }
        })
        .collect()
}

pub struct GeonodeClient {
    client: Client,
    config: GeonodeConfig,
}

impl GeonodeClient {
    pub fn new(config: GeonodeConfig) -> CdiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CdiError::InternalError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn resources_url(&self) -> String {
        format!("{}/api/v2/resources", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CatalogSource for GeonodeClient {
    #[instrument(skip(self), fields(base_url = %self.config.base_url))]
    async fn list_resources(&self, query: ResourceQuery) -> CdiResult<ResourcePage> {
        let mut params: Vec<(&str, String)> = vec![
            ("filter{category.identifier}", self.config.category.clone()),
            ("filter{subtype}", "raster".to_string()),
            ("page", query.page.max(1).to_string()),
            ("page_size", self.config.page_size.to_string()),
            ("sort[]", "-date".to_string()),
        ];
        if let Some(pk) = query.pk {
            params.push(("filter{pk}", pk.to_string()));
        }

        let mut request = self.client.get(self.resources_url()).query(&params);
        if !self.config.username.is_empty() {
            request = request.basic_auth(&self.config.username, Some(&self.config.password));
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "GeoNode request failed");
            CdiError::CatalogUnavailable(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "GeoNode returned an error");
            return Err(CdiError::CatalogUnavailable(format!("GeoNode returned {}", status)));
        }

        let page: ResourcePage = response
            .json()
            .await
            .map_err(|e| CdiError::CatalogUnavailable(format!("Invalid GeoNode response: {}", e)))?;

        debug!(
            page = page.page,
            total = page.total,
            resources = page.resources.len(),
            "Fetched GeoNode resources"
        );

        Ok(ResourcePage {
            resources: page.resources.into_iter().map(CdiResource::with_year_month).collect(),
            ..page
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_pk_string_or_number() {
        let r: CdiResource = serde_json::from_value(json!({
            "pk": "17",
            "title": "CDI January 2025",
            "created": "2025-02-03T08:00:00Z",
            "date": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(r.pk, 17);
        let r = r.with_year_month();
        assert_eq!(r.year_month.unwrap().to_string(), "2025-01");

        let r: CdiResource = serde_json::from_value(json!({ "pk": 3 })).unwrap();
        assert_eq!(r.pk, 3);
        assert!(r.with_year_month().year_month.is_none());
    }

    #[test]
    fn test_year_month_falls_back_to_created() {
        let r: CdiResource = serde_json::from_value(json!({
            "pk": 1,
            "created": "2024-12-15T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(r.with_year_month().year_month.unwrap().to_string(), "2024-12");
    }

    #[test]
    fn test_has_next() {
        let page = ResourcePage {
            total: 25,
            page: 2,
            page_size: 10,
            resources: vec![serde_json::from_value(json!({"pk": 1})).unwrap()],
        };
        assert!(page.has_next());
        let last = ResourcePage { page: 3, ..page.clone() };
        assert!(!last.has_next());
        let empty = ResourcePage { resources: vec![], ..page };
        assert!(!empty.has_next());
    }

    #[test]
    fn test_annotate_joins_publications() {
        let resources: Vec<CdiResource> = vec![
            serde_json::from_value(json!({"pk": 1})).unwrap(),
            serde_json::from_value(json!({"pk": 2})).unwrap(),
        ];
        let entries = annotate(resources, &[(2, 40, PublicationStatus::InValidation)]);
        assert_eq!(entries[0].publication_id, None);
        assert_eq!(entries[1].publication_id, Some(40));
        assert_eq!(entries[1].status, Some(PublicationStatus::InValidation));

        let value = serde_json::to_value(&entries[1]).unwrap();
        assert_eq!(value["pk"], 2);
        assert_eq!(value["publication_id"], 40);
        assert_eq!(value["status"], 2);
    }
}

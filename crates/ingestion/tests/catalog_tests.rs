//! GeoNode client and catalog sync tests against a mock catalog.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Query;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use cdi_common::{CdiError, CdiResult, PublicationStatus};
use ingestion::config::GeonodeConfig;
use ingestion::{
    sync_catalog, CatalogSource, CdiResource, GeonodeClient, NotificationTemplates, ResourcePage,
    ResourceQuery,
};
use serde_json::{json, Value};
use storage::{JobType, NewUser, Role, Store};

fn resource(pk: Value, date: &str) -> Value {
    json!({
        "pk": pk,
        "title": format!("CDI {}", date),
        "detail_url": format!("https://geonode.example.org/catalogue/#/dataset/{}", pk),
        "embed_url": null,
        "thumbnail_url": null,
        "download_url": format!("https://geonode.example.org/datasets/cdi_{}/dataset_download", pk),
        "created": "2025-04-02T09:30:00Z",
        "date": date,
    })
}

async fn resources(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
    if !headers.contains_key(header::AUTHORIZATION) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if params.get("filter{category.identifier}").map(String::as_str) != Some("cdi") {
        return Json(json!({"total": 0, "page": 1, "page_size": 2, "resources": []})).into_response();
    }
    let page: i64 = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let items = match page {
        1 => vec![
            resource(json!(3), "2025-03-01T00:00:00Z"),
            resource(json!("2"), "2025-02-01T00:00:00Z"),
        ],
        2 => vec![resource(json!(1), "2025-01-01T00:00:00Z")],
        _ => vec![],
    };
    Json(json!({"total": 3, "page": page, "page_size": 2, "resources": items})).into_response()
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base_url: String) -> GeonodeClient {
    GeonodeClient::new(GeonodeConfig {
        base_url,
        username: "admin".into(),
        password: "admin".into(),
        page_size: 2,
        ..GeonodeConfig::default()
    })
    .unwrap()
}

/// Fixed listing for sync tests.
struct StaticCatalog(Vec<CdiResource>);

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn list_resources(&self, query: ResourceQuery) -> CdiResult<ResourcePage> {
        let page = query.page.max(1) as usize;
        let items: Vec<CdiResource> = self.0.iter().skip((page - 1) * 2).take(2).cloned().collect();
        Ok(ResourcePage {
            total: self.0.len() as i64,
            page: page as i64,
            page_size: 2,
            resources: items,
        })
    }
}

fn static_catalog() -> StaticCatalog {
    StaticCatalog(
        [(3, "2025-03-01"), (2, "2025-02-01"), (1, "2025-01-01")]
            .iter()
            .map(|(pk, date)| serde_json::from_value(resource(json!(pk), date)).unwrap())
            .collect(),
    )
}

// ============================================================================
// GeoNode client
// ============================================================================

#[tokio::test]
async fn test_client_lists_pages() {
    let base = serve(Router::new().route("/api/v2/resources", get(resources))).await;
    let client = client(base);

    let page = client
        .list_resources(ResourceQuery { page: 1, pk: None })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.resources.len(), 2);
    assert_eq!(page.resources[1].pk, 2);
    assert_eq!(page.resources[0].year_month.unwrap().to_string(), "2025-03");
    assert!(page.has_next());

    let all = ingestion::fetch_all_resources(&client).await.unwrap();
    let pks: Vec<i64> = all.iter().map(|r| r.pk).collect();
    assert_eq!(pks, vec![3, 2, 1]);
}

#[tokio::test]
async fn test_client_error_is_catalog_unavailable() {
    let base = serve(Router::new().route(
        "/api/v2/resources",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    ))
    .await;

    let err = client(base)
        .list_resources(ResourceQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CdiError::CatalogUnavailable(_)));
    assert_eq!(err.http_status_code(), 500);
}

#[tokio::test]
async fn test_client_unreachable_is_catalog_unavailable() {
    let err = client("http://127.0.0.1:9".to_string())
        .list_resources(ResourceQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CdiError::CatalogUnavailable(_)));
}

// ============================================================================
// Catalog sync
// ============================================================================

#[tokio::test]
async fn test_backfill_imports_maps_pending_values() {
    let store = Store::open_memory().await.unwrap();
    let report = sync_catalog(&store, &static_catalog(), &NotificationTemplates::default(), true)
        .await
        .unwrap();
    assert_eq!(report.scanned, 3);
    assert_eq!(report.created, 3);

    let publication = store.find_publication_by_geonode_id(2).await.unwrap().unwrap();
    assert_eq!(publication.status, PublicationStatus::InValidation);
    assert_eq!(publication.year_month.to_string(), "2025-02");
    assert_eq!(publication.due_date.to_string(), "2025-03-03");
    assert!(publication.published_at.is_none());
    assert!(publication.validated_values.is_none());

    // One zonal job per map, no review requests
    let mut compute_jobs = 0;
    while let Some(job) = store.claim_next_job().await.unwrap() {
        assert_eq!(job.job_type, JobType::ComputeInitialValues);
        assert_eq!(job.info["backfill"], true);
        compute_jobs += 1;
    }
    assert_eq!(compute_jobs, 3);

    // Second run creates nothing
    let again = sync_catalog(&store, &static_catalog(), &NotificationTemplates::default(), true)
        .await
        .unwrap();
    assert_eq!(again.created, 0);
    assert_eq!(again.skipped, 3);
}

#[tokio::test]
async fn test_backfill_adopts_initial_values() {
    let store = Store::open_memory().await.unwrap();
    sync_catalog(&store, &static_catalog(), &NotificationTemplates::default(), true)
        .await
        .unwrap();
    let publication = store.find_publication_by_geonode_id(1).await.unwrap().unwrap();
    store
        .set_initial_values(publication.id, &test_utils::strip_initial_values())
        .await
        .unwrap();

    let report = sync_catalog(&store, &static_catalog(), &NotificationTemplates::default(), true)
        .await
        .unwrap();
    assert_eq!(report.validated, 1);
    let publication = store.get_publication(publication.id).await.unwrap().unwrap();
    assert_eq!(publication.validated_values, Some(test_utils::strip_initial_values()));
    assert_eq!(publication.status, PublicationStatus::Published);
    assert_eq!(publication.published_at.unwrap().date_naive(), publication.due_date);
}

#[tokio::test]
async fn test_backfill_skips_resources_without_download() {
    let store = Store::open_memory().await.unwrap();
    let mut catalog = static_catalog();
    catalog.0[1].download_url = None;
    catalog.0[2].download_url = Some(String::new());

    let report = sync_catalog(&store, &catalog, &NotificationTemplates::default(), true)
        .await
        .unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.skipped, 2);
    assert!(store.find_publication_by_geonode_id(2).await.unwrap().is_none());
    assert!(store.find_publication_by_geonode_id(1).await.unwrap().is_none());

    let job = store.claim_next_job().await.unwrap().unwrap();
    assert_eq!(job.job_type, JobType::ComputeInitialValues);
    assert!(store.claim_next_job().await.unwrap().is_none());
}

#[tokio::test]
async fn test_regular_sync_assigns_reviewers() {
    let store = Store::open_memory().await.unwrap();
    for n in 1..=2 {
        store
            .create_user(&NewUser {
                name: format!("Reviewer {}", n),
                email: format!("r{}@example.org", n),
                role: Role::Reviewer,
                technical_working_group: None,
                api_token: None,
            })
            .await
            .unwrap();
    }

    let catalog = StaticCatalog(static_catalog().0.into_iter().take(1).collect());
    let report = sync_catalog(&store, &catalog, &NotificationTemplates::default(), false)
        .await
        .unwrap();
    assert_eq!(report.created, 1);

    let publication = store.find_publication_by_geonode_id(3).await.unwrap().unwrap();
    assert_eq!(publication.status, PublicationStatus::InReview);
    assert_eq!(store.reviews_for_publication(publication.id).await.unwrap().len(), 2);

    let mut types = Vec::new();
    while let Some(job) = store.claim_next_job().await.unwrap() {
        types.push(job.job_type);
    }
    assert_eq!(
        types,
        vec![JobType::ComputeInitialValues, JobType::ReviewRequest, JobType::ReviewRequest]
    );
}

#[tokio::test]
async fn test_sync_propagates_catalog_failure() {
    struct Down;

    #[async_trait]
    impl CatalogSource for Down {
        async fn list_resources(&self, _query: ResourceQuery) -> CdiResult<ResourcePage> {
            Err(CdiError::CatalogUnavailable("offline".into()))
        }
    }

    let store = Store::open_memory().await.unwrap();
    let catalog: Arc<dyn CatalogSource> = Arc::new(Down);
    assert!(sync_catalog(&store, catalog.as_ref(), &NotificationTemplates::default(), false)
        .await
        .is_err());
}

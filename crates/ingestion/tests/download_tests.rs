//! Download manager tests against a local HTTP server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use ingestion::{DownloadConfig, DownloadManager, RasterFetcher};
use test_utils::{geotiff_bytes, strip_raster_data, GeoSpec, STRIP_RASTER_HEIGHT, STRIP_RASTER_WIDTH};

#[derive(Clone)]
struct Served {
    bytes: Arc<Vec<u8>>,
    gets: Arc<AtomicUsize>,
    range_requests: Arc<AtomicUsize>,
}

async fn raster(State(served): State<Served>, headers: HeaderMap) -> Response {
    served.gets.fetch_add(1, Ordering::SeqCst);
    let total = served.bytes.len();

    let start = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("bytes="))
        .and_then(|v| v.trim_end_matches('-').parse::<usize>().ok());

    match start {
        Some(start) if start < total => {
            served.range_requests.fetch_add(1, Ordering::SeqCst);
            let body = served.bytes[start..].to_vec();
            (
                StatusCode::PARTIAL_CONTENT,
                [
                    (header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, total - 1, total)),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
                body,
            )
                .into_response()
        }
        Some(_) => StatusCode::RANGE_NOT_SATISFIABLE.into_response(),
        None => (
            StatusCode::OK,
            [(header::ACCEPT_RANGES, "bytes".to_string())],
            served.bytes.to_vec(),
        )
            .into_response(),
    }
}

async fn serve(served: Served) -> String {
    let app = Router::new()
        .route("/raster.tif", get(raster))
        .route("/missing.tif", get(|| async { StatusCode::NOT_FOUND }))
        .with_state(served);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn served() -> Served {
    Served {
        bytes: Arc::new(geotiff_bytes(
            STRIP_RASTER_WIDTH,
            STRIP_RASTER_HEIGHT,
            &strip_raster_data(),
            GeoSpec::strips(),
        )),
        gets: Arc::new(AtomicUsize::new(0)),
        range_requests: Arc::new(AtomicUsize::new(0)),
    }
}

fn manager(dir: &std::path::Path) -> DownloadManager {
    DownloadManager::new(DownloadConfig {
        max_retries: 1,
        initial_retry_delay: Duration::from_millis(10),
        max_retry_delay: Duration::from_millis(20),
        request_timeout: Duration::from_secs(10),
        temp_dir: dir.join("tmp"),
        output_dir: dir.join("rasters"),
    })
    .unwrap()
}

// ============================================================================
// Downloads
// ============================================================================

#[tokio::test]
async fn test_full_download() {
    let dir = tempfile::tempdir().unwrap();
    let served = served();
    let base = serve(served.clone()).await;

    let path = manager(dir.path())
        .fetch(&format!("{}/raster.tif", base), "cdi_1.tif")
        .await
        .unwrap();

    assert_eq!(path, dir.path().join("rasters/cdi_1.tif"));
    assert_eq!(std::fs::read(&path).unwrap(), *served.bytes);
    assert!(!dir.path().join("tmp/cdi_1.tif.partial").exists());
    assert_eq!(served.range_requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_resumes_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let served = served();
    let base = serve(served.clone()).await;

    std::fs::create_dir_all(dir.path().join("tmp")).unwrap();
    std::fs::write(dir.path().join("tmp/cdi_2.tif.partial"), &served.bytes[..100]).unwrap();

    let path = manager(dir.path())
        .download(&format!("{}/raster.tif", base), "cdi_2.tif")
        .await
        .unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), *served.bytes);
    assert_eq!(served.range_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_existing_file_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    let served = served();
    let base = serve(served.clone()).await;

    std::fs::create_dir_all(dir.path().join("rasters")).unwrap();
    std::fs::write(dir.path().join("rasters/cdi_3.tif"), b"cached").unwrap();

    let path = manager(dir.path())
        .download(&format!("{}/raster.tif", base), "cdi_3.tif")
        .await
        .unwrap();

    assert_eq!(std::fs::read(path).unwrap(), b"cached");
    assert_eq!(served.gets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_http_error_fails_after_retries() {
    let dir = tempfile::tempdir().unwrap();
    let base = serve(served()).await;

    let err = manager(dir.path())
        .download(&format!("{}/missing.tif", base), "cdi_4.tif")
        .await
        .unwrap_err();

    assert!(err.to_string().contains("after 1 retries"));
    assert!(!dir.path().join("rasters/cdi_4.tif").exists());
}

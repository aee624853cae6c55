//! `cdi-api`: REST API for CDI drought map publications, plus the in-process job runner.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use cdi_api::build_router;
use cdi_api::state::AppState;
use ingestion::{AppConfig, DownloadManager, JobRunner, LogNotifier, DEFAULT_CONFIG_PATH};

/// Command-line options for the API server.
#[derive(Parser, Debug)]
#[command(name = "cdi-api")]
#[command(about = "REST API for CDI drought map publications")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "CDI_CONFIG")]
    config: PathBuf,

    /// Listen address (overrides the configured host and port)
    #[arg(short, long, env = "CDI_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Number of worker threads
    #[arg(long, env = "CDI_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(threads) = args.worker_threads {
        builder.worker_threads(threads);
    }
    builder
        .build()
        .context("Failed to create Tokio runtime")?
        .block_on(run_server(args))
}

async fn run_server(args: Args) -> Result<()> {
    // JSON lines for the log shipper
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    info!("Starting CDI map API server");

    let config = AppConfig::load(&args.config)?;

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let state = AppState::new(&config)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to initialize application state");
            e
        })?
        .with_prometheus(prometheus);
    let state = Arc::new(state);

    if config.jobs.enabled {
        let fetcher = DownloadManager::new(config.download_config())?
            .with_basic_auth(&config.geonode.username, &config.geonode.password);
        let runner = JobRunner::new(
            state.store.clone(),
            Arc::new(fetcher),
            Arc::new(LogNotifier),
            state.boundaries.clone(),
        )
        .with_zonal_options(config.zonal)
        .with_max_attempts(config.jobs.max_attempts)
        .with_poll_interval(Duration::from_millis(config.jobs.poll_interval_ms));
        tokio::spawn(runner.run());
    } else {
        warn!("Job runner disabled; run `cdi-admin run-jobs` to process queued jobs");
    }

    let app = build_router(state);

    let listen = args.listen.unwrap_or_else(|| config.listen_addr());
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("Invalid listen address: {}", listen))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, publications_db = %config.database_url, "CDI API listening");
    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}

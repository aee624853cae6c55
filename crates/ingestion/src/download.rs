//! Fetching CDI rasters from GeoNode.
//!
//! A raster is streamed into `<temp_dir>/<name>.partial` and moved into
//! `output_dir` once its length checks out. An interrupted transfer is picked
//! up again with a `Range` request when the server allows it. Files already in
//! `output_dir` are never fetched twice.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use metrics::counter;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Fetches a raster to a local file.
#[async_trait]
pub trait RasterFetcher: Send + Sync {
    async fn fetch(&self, url: &str, filename: &str) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub max_retries: u32,
    /// Doubles after every failed attempt.
    pub initial_retry_delay: Duration,
    pub max_retry_delay: Duration,
    pub request_timeout: Duration,
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_retry_delay: Duration::from_secs(2),
            max_retry_delay: Duration::from_secs(120),
            request_timeout: Duration::from_secs(600),
            temp_dir: PathBuf::from("data/tmp"),
            output_dir: PathBuf::from("data/rasters"),
        }
    }
}

impl DownloadConfig {
    /// Pause before retry number `retry` (1-based).
    fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_retry_delay
            .checked_mul(factor)
            .map_or(self.max_retry_delay, |d| d.min(self.max_retry_delay))
    }
}

/// What a HEAD request told us about the raster.
#[derive(Debug, Clone, Copy, Default)]
struct RemoteRaster {
    length: Option<u64>,
    ranges: bool,
}

impl RemoteRaster {
    fn from_response(response: &Response) -> Self {
        Self {
            length: content_length(response),
            ranges: accepts_ranges(response),
        }
    }
}

/// Bytes of the raster held in the partial file, and how many are expected.
#[derive(Debug, Default)]
struct Transfer {
    expected: Option<u64>,
    received: u64,
}

impl Transfer {
    fn is_complete(&self) -> bool {
        matches!(self.expected, Some(n) if self.received >= n)
    }
}

pub struct DownloadManager {
    client: Client,
    config: DownloadConfig,
    credentials: Option<(String, String)>,
}

impl DownloadManager {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build GeoNode download client")?;

        Ok(Self {
            client,
            config,
            credentials: None,
        })
    }

    /// Send HTTP basic auth with every request (GeoNode dataset downloads).
    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.credentials =
            (!username.is_empty()).then(|| (username.to_string(), password.to_string()));
        self
    }

    pub fn output_path(&self, filename: &str) -> PathBuf {
        self.config.output_dir.join(filename)
    }

    fn partial_path(&self, filename: &str) -> PathBuf {
        self.config.temp_dir.join(format!("{}.partial", filename))
    }

    /// Fetch `url` into `output_dir/filename`, retrying with backoff.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn download(&self, url: &str, filename: &str) -> Result<PathBuf> {
        let target = self.output_path(filename);
        if fs::try_exists(&target).await.unwrap_or(false) {
            info!(path = %target.display(), "Raster already downloaded");
            return Ok(target);
        }

        fs::create_dir_all(&self.config.temp_dir).await?;
        fs::create_dir_all(&self.config.output_dir).await?;
        let partial = self.partial_path(filename);

        let mut retry = 0;
        let transfer = loop {
            match self.attempt(url, &partial).await {
                Ok(transfer) => break transfer,
                Err(e) if retry < self.config.max_retries => {
                    retry += 1;
                    let pause = self.config.backoff(retry);
                    warn!(
                        error = %e,
                        retry,
                        max_retries = self.config.max_retries,
                        pause_ms = pause.as_millis() as u64,
                        "Raster download attempt failed"
                    );
                    tokio::time::sleep(pause).await;
                }
                Err(e) => {
                    counter!("cdi_download_failures_total").increment(1);
                    return Err(anyhow!(
                        "Raster download failed after {} retries: {}",
                        self.config.max_retries,
                        e
                    ));
                }
            }
        };

        if let Err(e) = self.commit(&partial, &target, &transfer).await {
            counter!("cdi_download_failures_total").increment(1);
            return Err(e);
        }

        counter!("cdi_downloads_total").increment(1);
        info!(
            path = %target.display(),
            bytes = transfer.received,
            retries = retry,
            "Raster downloaded"
        );
        Ok(target)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((username, password)) => builder.basic_auth(username, Some(password)),
            None => builder,
        }
    }

    /// HEAD the raster. Servers that reject HEAD yield an empty description.
    async fn inspect(&self, url: &str) -> Result<RemoteRaster> {
        let response = self
            .authorized(self.client.head(url))
            .send()
            .await
            .context("HEAD request to GeoNode failed")?;
        if response.status().is_success() {
            Ok(RemoteRaster::from_response(&response))
        } else {
            Ok(RemoteRaster::default())
        }
    }

    /// One GET, continuing from whatever the partial file already holds.
    async fn attempt(&self, url: &str, partial: &Path) -> Result<Transfer> {
        let remote = self.inspect(url).await?;
        let mut transfer = Transfer {
            expected: remote.length,
            received: partial_len(partial).await?,
        };
        if transfer.is_complete() {
            return Ok(transfer);
        }

        let mut request = self.authorized(self.client.get(url));
        if transfer.received > 0 {
            if remote.ranges {
                debug!(offset = transfer.received, "Continuing partial raster");
                request = request.header(header::RANGE, format!("bytes={}-", transfer.received));
            } else {
                warn!("GeoNode refuses range requests, starting raster over");
                discard(partial, &mut transfer).await;
            }
        }

        let response = request.send().await.context("GET request to GeoNode failed")?;
        match response.status() {
            StatusCode::PARTIAL_CONTENT => {}
            StatusCode::OK => {
                // Full body: anything kept from before is stale
                discard(partial, &mut transfer).await;
                if transfer.expected.is_none() {
                    transfer.expected = content_length(&response);
                }
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                discard(partial, &mut transfer).await;
                bail!("GeoNode rejected the resume offset");
            }
            status => bail!("GeoNode answered {}", status),
        }

        self.append_body(response, partial, &mut transfer).await?;
        Ok(transfer)
    }

    async fn append_body(
        &self,
        response: Response,
        partial: &Path,
        transfer: &mut Transfer,
    ) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(partial)
            .await
            .with_context(|| format!("Cannot open {}", partial.display()))?;

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.context("Raster stream interrupted")?;
            file.write_all(&chunk).await?;
            transfer.received += chunk.len() as u64;
        }
        file.sync_all().await?;

        debug!(received = transfer.received, expected = ?transfer.expected, "Raster body stored");
        Ok(())
    }

    /// Check the partial file against the advertised length and move it into place.
    async fn commit(&self, partial: &Path, target: &Path, transfer: &Transfer) -> Result<()> {
        let on_disk = partial_len(partial).await?;
        if let Some(expected) = transfer.expected {
            if on_disk != expected {
                fs::remove_file(partial).await.ok();
                bail!(
                    "Raster length mismatch: GeoNode advertised {} bytes, received {}",
                    expected,
                    on_disk
                );
            }
        }

        if fs::rename(partial, target).await.is_err() {
            // temp_dir may live on another filesystem
            fs::copy(partial, target).await?;
            fs::remove_file(partial).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RasterFetcher for DownloadManager {
    async fn fetch(&self, url: &str, filename: &str) -> Result<PathBuf> {
        self.download(url, filename).await
    }
}

async fn partial_len(path: &Path) -> Result<u64> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

async fn discard(partial: &Path, transfer: &mut Transfer) {
    if transfer.received > 0 {
        fs::remove_file(partial).await.ok();
        transfer.received = 0;
    }
}

fn content_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
        .filter(|len| *len > 0)
}

/// Missing `Accept-Ranges` counts as support.
fn accepts_ranges(response: &Response) -> bool {
    response
        .headers()
        .get(header::ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map_or(true, |v| !v.eq_ignore_ascii_case("none"))
}

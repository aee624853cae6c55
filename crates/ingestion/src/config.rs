//! Application configuration shared by the API service and the admin CLI.
//!
//! Loaded from `config/cdi.yaml` with `${VAR}` / `${VAR:-default}`
//! substitution. A handful of environment variables then override the file
//! so secrets never need to live in it:
//!
//! | Variable                  | Field                |
//! |---------------------------|----------------------|
//! | `DATABASE_URL`            | `database_url`       |
//! | `GEONODE_BASE_URL`        | `geonode.base_url`   |
//! | `GEONODE_ADMIN_USERNAME`  | `geonode.username`   |
//! | `GEONODE_ADMIN_PASSWORD`  | `geonode.password`   |

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use zonal_stats::ZonalOptions;

use crate::download::DownloadConfig;
use crate::notify::NotificationTemplates;

pub const DEFAULT_CONFIG_PATH: &str = "config/cdi.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database_url: String,
    /// Root for downloaded rasters.
    pub data_dir: PathBuf,
    /// GeoJSON or TopoJSON with the administrative regions.
    pub boundaries_path: PathBuf,
    pub geonode: GeonodeConfig,
    pub zonal: ZonalOptions,
    pub download: DownloadSettings,
    pub jobs: JobsConfig,
    pub export: ExportConfig,
    pub notifications: NotificationTemplates,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database_url: "sqlite://data/cdi.db".to_string(),
            data_dir: PathBuf::from("data"),
            boundaries_path: PathBuf::from("data/administrations.topojson"),
            geonode: GeonodeConfig::default(),
            zonal: ZonalOptions::default(),
            download: DownloadSettings::default(),
            jobs: JobsConfig::default(),
            export: ExportConfig::default(),
            notifications: NotificationTemplates::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeonodeConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Category identifier of CDI rasters in the catalog.
    pub category: String,
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for GeonodeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            username: String::new(),
            password: String::new(),
            category: "cdi".to_string(),
            page_size: 10,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub max_retries: u32,
    pub initial_retry_delay_secs: u64,
    pub max_retry_delay_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_retry_delay_secs: 2,
            max_retry_delay_secs: 120,
            request_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Run the job runner inside the API process.
    pub enabled: bool,
    pub poll_interval_ms: u64,
    pub max_attempts: i64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 2000,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Width of PNG/SVG exports in pixels; height follows the aspect ratio.
    pub image_width: u32,
    pub padding: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            image_width: 1200,
            padding: 20,
        }
    }
}

impl AppConfig {
    /// Load from a YAML file, falling back to defaults when it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            let config = Self::from_yaml_str(&content)
                .with_context(|| format!("Failed to parse config from {:?}", path))?;
            info!(path = %path.display(), "Loaded configuration");
            config
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: AppConfig =
            serde_yaml::from_str(&expanded).context("Invalid configuration YAML")?;
        Ok(config)
    }

    /// Apply the environment overrides through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(url) = lookup("GEONODE_BASE_URL") {
            self.geonode.base_url = url;
        }
        if let Some(username) = lookup("GEONODE_ADMIN_USERNAME") {
            self.geonode.username = username;
        }
        if let Some(password) = lookup("GEONODE_ADMIN_PASSWORD") {
            self.geonode.password = password;
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.database_url.is_empty(), "database_url cannot be empty");
        anyhow::ensure!(
            !self.geonode.base_url.is_empty(),
            "geonode.base_url cannot be empty"
        );
        anyhow::ensure!(self.geonode.page_size > 0, "geonode.page_size must be greater than 0");
        anyhow::ensure!(self.jobs.max_attempts > 0, "jobs.max_attempts must be greater than 0");
        anyhow::ensure!(
            self.export.image_width >= 64,
            "export.image_width must be at least 64"
        );
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig {
            max_retries: self.download.max_retries,
            initial_retry_delay: Duration::from_secs(self.download.initial_retry_delay_secs),
            max_retry_delay: Duration::from_secs(self.download.max_retry_delay_secs),
            request_timeout: Duration::from_secs(self.download.request_timeout_secs),
            temp_dir: self.data_dir.join("tmp"),
            output_dir: self.data_dir.join("rasters"),
        }
    }
}

/// Expand `${VAR}` and `${VAR:-default}` from the process environment.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut expr = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", expr),
                }
            }
            result.push_str(&resolve_var_expr(&expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    match expr.split_once(":-") {
        Some((name, default)) => Ok(std::env::var(name).unwrap_or_else(|_| default.to_string())),
        None => std::env::var(expr)
            .with_context(|| format!("Environment variable {} is not set", expr)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use zonal_stats::Statistic;

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.listen_addr(), "0.0.0.0:8000");
        assert_eq!(config.zonal.statistic, Statistic::Mean);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
database_url: "sqlite::memory:"
geonode:
  base_url: "https://geonode.example.org"
  category: "cdi-monthly"
zonal:
  statistic: median
jobs:
  max_attempts: 5
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.geonode.base_url, "https://geonode.example.org");
        assert_eq!(config.geonode.category, "cdi-monthly");
        assert_eq!(config.geonode.page_size, 10);
        assert_eq!(config.zonal.statistic, Statistic::Median);
        assert!(!config.zonal.all_touched);
        assert_eq!(config.jobs.max_attempts, 5);
        assert_eq!(config.jobs.poll_interval_ms, 2000);
        assert_eq!(config.export.image_width, 1200);
    }

    #[test]
    fn test_count_statistic_from_yaml() {
        let config = AppConfig::from_yaml_str("zonal:\n  statistic: count\n  all_touched: true\n").unwrap();
        assert_eq!(config.zonal.statistic, Statistic::Count);
        assert!(config.zonal.all_touched);
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = AppConfig::from_yaml_str(include_str!("../../../config/cdi.yaml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.geonode.category, "cdi");
        assert!(config.notifications.review_request_body.contains("{{review_id}}"));
    }

    #[test]
    fn test_default_substitution() {
        let yaml = "database_url: \"${CDI_TEST_UNSET_VARIABLE_XYZ:-sqlite://fallback.db}\"\n";
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.database_url, "sqlite://fallback.db");
    }

    #[test]
    fn test_missing_variable_is_an_error() {
        let yaml = "database_url: \"${CDI_TEST_UNSET_VARIABLE_XYZ}\"\n";
        assert!(AppConfig::from_yaml_str(yaml).is_err());
        assert!(expand_env_vars("x: ${UNCLOSED").is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite://override.db"),
            ("GEONODE_ADMIN_USERNAME", "admin"),
            ("GEONODE_ADMIN_PASSWORD", "secret"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.database_url, "sqlite://override.db");
        assert_eq!(config.geonode.username, "admin");
        assert_eq!(config.geonode.password, "secret");
        assert_eq!(config.geonode.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.jobs.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("missing.yaml")).unwrap();
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_download_paths_follow_data_dir() {
        let mut config = AppConfig::default();
        config.data_dir = PathBuf::from("/srv/cdi");
        let download = config.download_config();
        assert_eq!(download.temp_dir, PathBuf::from("/srv/cdi/tmp"));
        assert_eq!(download.output_dir, PathBuf::from("/srv/cdi/rasters"));
    }
}

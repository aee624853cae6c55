//! CDI map operator CLI.
//!
//! Database setup, user management, catalog sync and one-off job runs,
//! sharing configuration with the API server.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use cdi_common::time::parse_date;
use cdi_common::BoundarySet;
use ingestion::{
    check_overdue, sync_catalog, AppConfig, DownloadManager, GeonodeClient, JobRunner, LogNotifier,
    DEFAULT_CONFIG_PATH,
};
use storage::{Administration, NewUser, Role, Store};
use zonal_stats::{read_raster_bytes, zonal_statistics, Statistic, ZonalOptions};

#[derive(Parser, Debug)]
#[command(name = "cdi-admin")]
#[command(about = "Operator commands for the CDI map service", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH, env = "CDI_CONFIG")]
    config: PathBuf,

    /// Log level
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or update the database schema
    Migrate,

    /// Load administrative regions from the boundary file
    SeedAdministrations {
        /// Boundary file (defaults to the configured one)
        #[arg(long)]
        boundaries: Option<PathBuf>,
    },

    /// Create a user and print its API token
    CreateUser {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long, value_enum, default_value_t = RoleArg::Reviewer)]
        role: RoleArg,

        /// Technical working group of a reviewer
        #[arg(long)]
        technical_working_group: Option<String>,

        /// API token (generated when omitted)
        #[arg(long)]
        token: Option<String>,
    },

    /// Create publications for catalog resources that have none
    SyncCatalog {
        /// Import historical maps and publish them once their values are computed
        #[arg(long)]
        backfill: bool,
    },

    /// Queue reminders for reviews past their due date
    CheckOverdue {
        /// Evaluate as of this date (YYYY-MM-DD) instead of today
        #[arg(long)]
        mock_now: Option<String>,
    },

    /// Process queued jobs
    RunJobs {
        /// Exit once the queue is empty
        #[arg(long)]
        once: bool,
    },

    /// Print per-region statistics for a raster
    Zonal {
        /// GeoTIFF file, or ZIP archive holding one
        raster: PathBuf,

        #[arg(long)]
        statistic: Option<String>,

        /// Select every pixel a region touches
        #[arg(long)]
        all_touched: bool,

        /// Boundary file (defaults to the configured one)
        #[arg(long)]
        boundaries: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RoleArg {
    Admin,
    Reviewer,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => Role::Admin,
            RoleArg::Reviewer => Role::Reviewer,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Logs go to stderr so command output can be piped
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Migrate => {
            open_store(&config).await?;
            info!("Migrations applied");
        }
        Commands::SeedAdministrations { boundaries } => {
            let store = open_store(&config).await?;
            let set = load_boundaries(boundaries.as_deref().unwrap_or(&config.boundaries_path))?;
            let inserted = store
                .upsert_administrations(&Administration::from_boundaries(&set))
                .await?;
            println!("{} administrations loaded, {} new", set.len(), inserted);
        }
        Commands::CreateUser {
            name,
            email,
            role,
            technical_working_group,
            token,
        } => {
            let store = open_store(&config).await?;
            let token = token.unwrap_or_else(generate_token);
            let user = store
                .create_user(&NewUser {
                    name,
                    email,
                    role: role.into(),
                    technical_working_group,
                    api_token: Some(token.clone()),
                })
                .await?;
            info!(user_id = user.id, role = ?user.role, "User created");
            println!("{}", token);
        }
        Commands::SyncCatalog { backfill } => {
            let store = open_store(&config).await?;
            let catalog = GeonodeClient::new(config.geonode.clone())?;
            let report = sync_catalog(&store, &catalog, &config.notifications, backfill).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::CheckOverdue { mock_now } => {
            let store = open_store(&config).await?;
            let today = match mock_now {
                Some(raw) => parse_date(&raw)?,
                None => Utc::now().date_naive(),
            };
            let queued = check_overdue(&store, &config.notifications, today).await?;
            println!("{} overdue reminders queued", queued);
        }
        Commands::RunJobs { once } => {
            let store = open_store(&config).await?;
            let boundaries = load_boundaries(&config.boundaries_path)?;
            let fetcher = DownloadManager::new(config.download_config())?
                .with_basic_auth(&config.geonode.username, &config.geonode.password);
            let runner = JobRunner::new(store, Arc::new(fetcher), Arc::new(LogNotifier), Arc::new(boundaries))
                .with_zonal_options(config.zonal)
                .with_max_attempts(config.jobs.max_attempts)
                .with_poll_interval(Duration::from_millis(config.jobs.poll_interval_ms));
            if once {
                let outcomes = runner.drain().await?;
                println!("{} jobs processed", outcomes.len());
            } else {
                runner.run().await;
            }
        }
        Commands::Zonal {
            raster,
            statistic,
            all_touched,
            boundaries,
        } => {
            let set = load_boundaries(boundaries.as_deref().unwrap_or(&config.boundaries_path))?;
            let options = zonal_options(&config.zonal, statistic.as_deref(), all_touched)?;
            let bytes = std::fs::read(&raster)
                .with_context(|| format!("Failed to read {}", raster.display()))?;
            let grid = read_raster_bytes(bytes)?;
            let results = tokio::task::spawn_blocking(move || zonal_statistics(&grid, &set, &options)).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    Ok(())
}

async fn open_store(config: &AppConfig) -> Result<Store> {
    let store = Store::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open {}", config.database_url))?;
    store.migrate().await.context("Failed to run migrations")?;
    Ok(store)
}

fn load_boundaries(path: &Path) -> Result<BoundarySet> {
    let set = BoundarySet::load(path).with_context(|| format!("Failed to load boundaries from {}", path.display()))?;
    if set.is_empty() {
        warn!(path = %path.display(), "Boundary file has no regions");
    }
    Ok(set)
}

/// Configured zonal options with command-line overrides.
fn zonal_options(base: &ZonalOptions, statistic: Option<&str>, all_touched: bool) -> Result<ZonalOptions> {
    let mut options = *base;
    if let Some(name) = statistic {
        options.statistic = name.parse::<Statistic>()?;
    }
    if all_touched {
        options.all_touched = true;
    }
    Ok(options)
}

fn generate_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zonal_option_overrides() {
        let options = zonal_options(&ZonalOptions::default(), Some("median"), true).unwrap();
        assert_eq!(options.statistic, Statistic::Median);
        assert!(options.all_touched);

        let untouched = zonal_options(&ZonalOptions::default(), None, false).unwrap();
        assert_eq!(untouched, ZonalOptions::default());

        assert!(zonal_options(&ZonalOptions::default(), Some("mode"), false).is_err());
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from(["cdi-admin", "check-overdue", "--mock-now", "2025-03-01"]);
        assert!(matches!(cli.command, Commands::CheckOverdue { mock_now: Some(ref d) } if d == "2025-03-01"));

        let cli = Cli::parse_from(["cdi-admin", "create-user", "--name", "A", "--email", "a@x.org", "--role", "admin"]);
        assert!(matches!(cli.command, Commands::CreateUser { role: RoleArg::Admin, .. }));

        let cli = Cli::parse_from(["cdi-admin", "zonal", "cdi.tif", "--statistic", "max"]);
        assert!(matches!(cli.command, Commands::Zonal { .. }));
    }
}

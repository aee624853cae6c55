//! SQLite connection pool and schema.
//!
//! [`Store`] wraps one [`SqlitePool`]. Each table gets its own module that
//! adds methods to `Store`, so handlers and jobs share a single cloneable
//! handle. The schema is applied idempotently by [`Store::migrate`] at
//! startup and for every in-memory test database.

use cdi_common::{CdiError, CdiResult};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

/// Rows per page for every paginated listing.
pub const PAGE_SIZE: i64 = 10;

/// Database handle shared by all repositories.
#[derive(Clone)]
pub struct Store {
    pub(crate) pool: SqlitePool,
}

impl Store {
    /// Connect to a database URL such as `sqlite://data/cdi.db`, creating the file if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CdiError::DatabaseError`] for a malformed URL or when the
    /// pool cannot connect. The schema is not applied here.
    pub async fn connect(database_url: &str) -> CdiResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| CdiError::DatabaseError(format!("Invalid database URL: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| CdiError::DatabaseError(format!("Connection failed: {}", e)))?;

        info!(url = %database_url, "Opened CDI database");
        Ok(Self { pool })
    }

    /// Open a migrated in-memory database (for testing).
    pub async fn open_memory() -> CdiResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true);

        // One connection: every new in-memory connection is a fresh database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| CdiError::DatabaseError(format!("Connection failed: {}", e)))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> CdiResult<()> {
        // Split SQL statements and execute them individually
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| CdiError::DatabaseError(format!("Migration failed: {}", e)))?;
            }
        }
        Ok(())
    }

    /// Cheap connectivity check behind the readiness endpoint.
    pub async fn ping(&self) -> CdiResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;
        Ok(())
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> i64 {
        (self.total + PAGE_SIZE - 1) / PAGE_SIZE
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
        }
    }
}

/// Offset of a 1-based page.
pub(crate) fn page_offset(page: i64) -> i64 {
    (page.max(1) - 1) * PAGE_SIZE
}

pub(crate) fn query_failed(e: sqlx::Error) -> CdiError {
    CdiError::DatabaseError(format!("Query failed: {}", e))
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map_or(false, |d| d.is_unique_violation())
}

/// Database schema SQL.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    role INTEGER NOT NULL,
    technical_working_group TEXT,
    email_verified BOOLEAN NOT NULL DEFAULT 0,
    api_token TEXT UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS administrations (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    region TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS publications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    year_month TEXT NOT NULL,
    cdi_geonode_id INTEGER NOT NULL UNIQUE,
    initial_values TEXT NOT NULL DEFAULT '[]',
    validated_values TEXT,
    due_date TEXT NOT NULL,
    status INTEGER NOT NULL DEFAULT 1,
    narrative TEXT,
    bulletin_url TEXT,
    published_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_publications_status ON publications(status);
CREATE INDEX IF NOT EXISTS idx_publications_year_month ON publications(year_month DESC);

CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    publication_id INTEGER NOT NULL REFERENCES publications(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    is_completed BOOLEAN NOT NULL DEFAULT 0,
    suggestion_values TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT,
    completed_at TEXT,
    is_overdue_notified BOOLEAN NOT NULL DEFAULT 0,
    UNIQUE(publication_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_reviews_user ON reviews(user_id);

CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id TEXT UNIQUE,
    type INTEGER NOT NULL,
    status INTEGER NOT NULL DEFAULT 1,
    attempt INTEGER NOT NULL DEFAULT 0,
    result TEXT,
    info TEXT NOT NULL DEFAULT '{}',
    created TEXT NOT NULL,
    available TEXT
);

CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)
"#;

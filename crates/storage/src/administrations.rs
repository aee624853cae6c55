//! Administrative regions seeded from the boundary file.

use crate::store::{query_failed, Store};
use cdi_common::{BoundarySet, CdiResult};
use chrono::Utc;
use serde::Serialize;
use sqlx::FromRow;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Administration {
    pub id: i64,
    pub name: String,
    pub region: Option<String>,
}

impl Administration {
    pub fn from_boundaries(boundaries: &BoundarySet) -> Vec<Administration> {
        boundaries
            .iter()
            .map(|b| Administration {
                id: b.administration_id,
                name: b.name.clone(),
                region: b.region.clone(),
            })
            .collect()
    }
}

impl Store {
    /// Insert regions that do not exist yet. Returns the number inserted.
    pub async fn upsert_administrations(&self, items: &[Administration]) -> CdiResult<u64> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(query_failed)?;
        let mut inserted = 0;
        for item in items {
            inserted += sqlx::query(
                "INSERT OR IGNORE INTO administrations (id, name, region, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(item.id)
            .bind(&item.name)
            .bind(&item.region)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(query_failed)?
            .rows_affected();
        }
        tx.commit().await.map_err(query_failed)?;

        info!(inserted, total = items.len(), "Seeded administrations");
        Ok(inserted)
    }

    pub async fn list_administrations(&self) -> CdiResult<Vec<Administration>> {
        sqlx::query_as("SELECT id, name, region FROM administrations ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed)
    }

    pub async fn count_administrations(&self) -> CdiResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM administrations")
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed)?;
        Ok(count.0)
    }
}

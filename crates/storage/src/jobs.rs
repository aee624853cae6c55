//! Persistent background job table.
//!
//! Jobs move `pending → on_progress → done | failed`. A failed attempt goes
//! back to `pending` until the attempt budget is spent.

use crate::store::{query_failed, Store};
use cdi_common::{CdiError, CdiResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    ComputeInitialValues,
    ReviewRequest,
    ReviewOverdue,
}

impl JobType {
    pub fn code(&self) -> i64 {
        match self {
            JobType::ComputeInitialValues => 1,
            JobType::ReviewRequest => 2,
            JobType::ReviewOverdue => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(JobType::ComputeInitialValues),
            2 => Some(JobType::ReviewRequest),
            3 => Some(JobType::ReviewOverdue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    OnProgress,
    Failed,
    Done,
}

impl JobStatus {
    pub fn code(&self) -> i64 {
        match self {
            JobStatus::Pending => 1,
            JobStatus::OnProgress => 2,
            JobStatus::Failed => 3,
            JobStatus::Done => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(JobStatus::Pending),
            2 => Some(JobStatus::OnProgress),
            3 => Some(JobStatus::Failed),
            4 => Some(JobStatus::Done),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: i64,
    pub task_id: Option<String>,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    pub attempt: i64,
    pub result: Option<Value>,
    pub info: Value,
    pub created: DateTime<Utc>,
    pub available: Option<DateTime<Utc>>,
}

#[derive(FromRow)]
struct JobRow {
    id: i64,
    task_id: Option<String>,
    #[sqlx(rename = "type")]
    job_type: i64,
    status: i64,
    attempt: i64,
    result: Option<Json<Value>>,
    info: Json<Value>,
    created: DateTime<Utc>,
    available: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = CdiError;

    fn try_from(row: JobRow) -> CdiResult<Self> {
        Ok(Job {
            id: row.id,
            task_id: row.task_id,
            job_type: JobType::from_code(row.job_type)
                .ok_or_else(|| CdiError::DatabaseError(format!("unknown job type {}", row.job_type)))?,
            status: JobStatus::from_code(row.status)
                .ok_or_else(|| CdiError::DatabaseError(format!("unknown job status {}", row.status)))?,
            attempt: row.attempt,
            result: row.result.map(|r| r.0),
            info: row.info.0,
            created: row.created,
            available: row.available,
        })
    }
}

const JOB_COLUMNS: &str = "id, task_id, type, status, attempt, result, info, created, available";

impl Store {
    pub async fn enqueue_job(&self, job_type: JobType, info: &Value) -> CdiResult<Job> {
        let task_id = Uuid::new_v4().to_string();
        let id = sqlx::query(
            "INSERT INTO jobs (task_id, type, status, attempt, info, created) VALUES (?, ?, ?, 0, ?, ?)",
        )
        .bind(&task_id)
        .bind(job_type.code())
        .bind(JobStatus::Pending.code())
        .bind(Json(info))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?
        .last_insert_rowid();

        debug!(job_id = id, task_id = %task_id, job_type = ?job_type, "Enqueued job");
        self.get_job(id).await?.ok_or(CdiError::NotFound("Job"))
    }

    pub async fn get_job(&self, id: i64) -> CdiResult<Option<Job>> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(query_failed)?;
        row.map(Job::try_from).transpose()
    }

    /// Take the oldest pending job and mark it in progress.
    pub async fn claim_next_job(&self) -> CdiResult<Option<Job>> {
        let mut tx = self.pool.begin().await.map_err(query_failed)?;

        let next: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM jobs WHERE status = ? ORDER BY id ASC LIMIT 1")
                .bind(JobStatus::Pending.code())
                .fetch_optional(&mut *tx)
                .await
                .map_err(query_failed)?;
        let Some((id,)) = next else {
            return Ok(None);
        };

        sqlx::query("UPDATE jobs SET status = ?, attempt = attempt + 1 WHERE id = ? AND status = ?")
            .bind(JobStatus::OnProgress.code())
            .bind(id)
            .bind(JobStatus::Pending.code())
            .execute(&mut *tx)
            .await
            .map_err(query_failed)?;
        tx.commit().await.map_err(query_failed)?;

        self.get_job(id).await
    }

    pub async fn complete_job(&self, id: i64, result: &Value) -> CdiResult<()> {
        sqlx::query("UPDATE jobs SET status = ?, result = ?, available = ? WHERE id = ?")
            .bind(JobStatus::Done.code())
            .bind(Json(result))
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;
        info!(job_id = id, "Job done");
        Ok(())
    }

    /// Record a failed attempt. Returns the job's new status.
    ///
    /// # Arguments
    ///
    /// * `error` - stored under `result.error` for the admin job listing
    /// * `max_attempts` - once the claimed attempt reaches this, the job is
    ///   `Failed`; otherwise it goes back to `Pending`
    pub async fn fail_job(&self, id: i64, error: &str, max_attempts: i64) -> CdiResult<JobStatus> {
        let job = self.get_job(id).await?.ok_or(CdiError::NotFound("Job"))?;
        let status = if job.attempt >= max_attempts {
            JobStatus::Failed
        } else {
            JobStatus::Pending
        };

        sqlx::query("UPDATE jobs SET status = ?, result = ? WHERE id = ?")
            .bind(status.code())
            .bind(Json(serde_json::json!({ "error": error })))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;

        warn!(job_id = id, attempt = job.attempt, max_attempts, status = ?status, error, "Job attempt failed");
        Ok(status)
    }

    /// Put jobs left in progress by a crashed worker back in the queue.
    pub async fn requeue_stale_jobs(&self) -> CdiResult<u64> {
        let result = sqlx::query("UPDATE jobs SET status = ? WHERE status = ?")
            .bind(JobStatus::Pending.code())
            .bind(JobStatus::OnProgress.code())
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;
        Ok(result.rows_affected())
    }
}

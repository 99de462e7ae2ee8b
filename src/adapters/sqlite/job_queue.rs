//! SQLite-backed QA job queue.
//!
//! Claiming is a single `UPDATE ... RETURNING` over the oldest queued row, so
//! two workers polling the same database never receive the same job.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{parse_datetime, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{JobStatus, QaJob, QaStage};
use crate::domain::ports::JobQueue;

const JOB_COLUMNS: &str = "job_id, name, trace_id, status, error, attempts, enqueued_at, started_at, finished_at";

#[derive(Clone)]
pub struct SqliteJobQueue {
    pool: SqlitePool,
}

impl SqliteJobQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn finish(&self, job_id: Uuid, status: JobStatus, error: Option<&str>) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE qa_jobs SET status = ?, error = ?, finished_at = ? WHERE job_id = ? AND status = 'running'",
        )
        .bind(status.as_str())
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ConcurrencyConflict {
                entity: "qa_job".to_string(),
                id: job_id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, stage: QaStage, trace_id: Uuid) -> DomainResult<Uuid> {
        let job_id = Uuid::new_v4();
        sqlx::query("INSERT INTO qa_jobs (job_id, name, trace_id, status, attempts, enqueued_at) VALUES (?, ?, ?, 'queued', 0, ?)")
            .bind(job_id.to_string())
            .bind(stage.as_str())
            .bind(trace_id.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(job_id)
    }

    async fn claim_next(&self) -> DomainResult<Option<QaJob>> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "UPDATE qa_jobs SET status = 'running', attempts = attempts + 1, started_at = ?
             WHERE job_id = (
                 SELECT job_id FROM qa_jobs WHERE status = 'queued' ORDER BY enqueued_at, rowid LIMIT 1
             )
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(Utc::now().to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;

        row.map(QaJob::try_from).transpose()
    }

    async fn mark_succeeded(&self, job_id: Uuid) -> DomainResult<()> {
        self.finish(job_id, JobStatus::Succeeded, None).await
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str) -> DomainResult<()> {
        self.finish(job_id, JobStatus::Failed, Some(error)).await
    }

    async fn get(&self, job_id: Uuid) -> DomainResult<Option<QaJob>> {
        let row: Option<JobRow> = sqlx::query_as(&format!("SELECT {JOB_COLUMNS} FROM qa_jobs WHERE job_id = ?"))
            .bind(job_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(QaJob::try_from).transpose()
    }

    async fn list_for_trace(&self, trace_id: Uuid) -> DomainResult<Vec<QaJob>> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM qa_jobs WHERE trace_id = ? ORDER BY enqueued_at, rowid"
        ))
        .bind(trace_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(QaJob::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    job_id: String,
    name: String,
    trace_id: String,
    status: String,
    error: Option<String>,
    attempts: i64,
    enqueued_at: String,
    started_at: Option<String>,
    finished_at: Option<String>,
}

impl TryFrom<JobRow> for QaJob {
    type Error = DomainError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let stage = QaStage::from_str(&row.name)
            .ok_or_else(|| DomainError::SerializationError(format!("Unknown QA stage: {}", row.name)))?;
        let status = JobStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid job status: {}", row.status)))?;

        Ok(QaJob {
            job_id: parse_uuid(&row.job_id)?,
            stage,
            trace_id: parse_uuid(&row.trace_id)?,
            status,
            error: row.error,
            attempts: u32::try_from(row.attempts).unwrap_or(0),
            enqueued_at: parse_datetime(&row.enqueued_at)?,
            started_at: parse_optional_datetime(row.started_at)?,
            finished_at: parse_optional_datetime(row.finished_at)?,
        })
    }
}

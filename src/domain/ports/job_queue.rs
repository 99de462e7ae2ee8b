//! QA job queue port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{QaJob, QaStage};

/// Durable queue of pipeline stage jobs.
///
/// Jobs are claimed atomically; a claimed job is never handed to a second
/// worker and failed jobs are never retried.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue `stage` for `trace_id`, returning the job id.
    async fn enqueue(&self, stage: QaStage, trace_id: Uuid) -> DomainResult<Uuid>;

    /// Claim the oldest queued job, marking it running.
    async fn claim_next(&self) -> DomainResult<Option<QaJob>>;

    async fn mark_succeeded(&self, job_id: Uuid) -> DomainResult<()>;

    async fn mark_failed(&self, job_id: Uuid, error: &str) -> DomainResult<()>;

    async fn get(&self, job_id: Uuid) -> DomainResult<Option<QaJob>>;

    /// Jobs for a trace in enqueue order.
    async fn list_for_trace(&self, trace_id: Uuid) -> DomainResult<Vec<QaJob>>;
}

//! Long-running QA worker: claims jobs and hands them to the pipeline.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use crate::domain::errors::DomainResult;
use crate::domain::models::{QaJob, WorkerConfig};
use crate::domain::ports::JobQueue;
use crate::services::qa_pipeline::{JobOutcome, QaPipeline};

pub struct QaWorker {
    queue: Arc<dyn JobQueue>,
    pipeline: Arc<QaPipeline>,
    poll_interval: Duration,
}

impl QaWorker {
    pub fn new(queue: Arc<dyn JobQueue>, pipeline: Arc<QaPipeline>, config: &WorkerConfig) -> Self {
        Self {
            queue,
            pipeline,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    /// Claim and run one job. `None` when the queue is empty.
    pub async fn run_next(&self) -> DomainResult<Option<(QaJob, JobOutcome)>> {
        let Some(job) = self.queue.claim_next().await? else {
            return Ok(None);
        };
        let outcome = self.pipeline.run_job(&job).await?;
        Ok(Some((job, outcome)))
    }

    /// Run jobs until the queue is empty, returning how many ran.
    ///
    /// Stages enqueue their successors, so one finalized trace drains
    /// through all three stages in a single call.
    #[instrument(skip(self))]
    pub async fn run_until_idle(&self) -> DomainResult<usize> {
        let mut processed = 0;
        while self.run_next().await?.is_some() {
            processed += 1;
        }
        info!(processed, "Queue drained");
        Ok(processed)
    }

    /// Poll until `shutdown` flips to `true`.
    ///
    /// Shutdown is observed between jobs; a running stage is never cut short.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> DomainResult<()> {
        info!(poll_interval = ?self.poll_interval, "QA worker started");
        while !*shutdown.borrow() {
            match self.run_next().await {
                Ok(Some((job, outcome))) => {
                    debug!(job_id = %job.job_id, outcome = ?outcome, "Job finished");
                    continue;
                }
                Ok(None) => {}
                Err(e) => error!(error = %e, "Worker iteration failed"),
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        info!("QA worker stopped");
        Ok(())
    }
}

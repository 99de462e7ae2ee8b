//! QA pipeline orchestrator.
//!
//! A finalized trace moves through three jobs: `qa.run_tests`, then
//! `qa.run_judge`, then `qa.finalize_qa`. Each stage enqueues its successor
//! only after its own write has landed, so the persisted trace plus the job
//! table is the whole pipeline state. A stage error fails the trace with
//! `qa.error` set and fails the job; nothing is retried.

mod finalize_stage;
mod judge_stage;
mod packet;
mod test_stage;

pub use judge_stage::{
    parse_evaluator_response, strip_code_fence, CONSENT_REFUSED_PREFIX, RUBRIC_TEXT, SYSTEM_PROMPT,
};
pub use packet::{cap_packet, render_packet, PacketPreviews};

use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Config, QaJob, QaStage, SandboxConfig, Trace, TraceStatus};
use crate::domain::ports::{Evaluator, JobQueue, Sandbox, TraceRepository};
use crate::services::ArtifactService;

/// Tunables the stages read from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub sandbox: SandboxConfig,
    /// Character cap on the evaluation packet.
    pub max_packet_chars: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sandbox: config.sandbox.clone(),
            max_packet_chars: config.judge.max_packet_chars,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What happened to one claimed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The stage finished; `next_job` is the successor it enqueued, if any.
    Succeeded { next_job: Option<Uuid> },
    /// The stage failed and the trace was moved to `failed`.
    Failed { error: String },
}

pub struct QaPipeline {
    traces: Arc<dyn TraceRepository>,
    queue: Arc<dyn JobQueue>,
    artifacts: ArtifactService,
    sandbox: Arc<dyn Sandbox>,
    evaluator: Arc<dyn Evaluator>,
    settings: PipelineSettings,
}

/// Message recorded in `qa.error` for a failed stage.
fn failure_message(err: &DomainError) -> String {
    match err {
        DomainError::Pipeline(msg) => msg.clone(),
        other => other.to_string(),
    }
}

impl QaPipeline {
    pub fn new(
        traces: Arc<dyn TraceRepository>,
        queue: Arc<dyn JobQueue>,
        artifacts: ArtifactService,
        sandbox: Arc<dyn Sandbox>,
        evaluator: Arc<dyn Evaluator>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            traces,
            queue,
            artifacts,
            sandbox,
            evaluator,
            settings,
        }
    }

    /// Run a claimed job to completion and record its outcome.
    ///
    /// Stage failures are absorbed into [`JobOutcome::Failed`]; an `Err` means
    /// the outcome itself could not be recorded.
    #[instrument(skip(self, job), fields(job_id = %job.job_id, stage = %job.stage, trace_id = %job.trace_id))]
    pub async fn run_job(&self, job: &QaJob) -> DomainResult<JobOutcome> {
        let result = match self.run_stage(job.stage, job.trace_id).await {
            Ok(()) => match job.stage.next() {
                Some(next) => self.queue.enqueue(next, job.trace_id).await.map(Some),
                None => Ok(None),
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(next_job) => {
                self.queue.mark_succeeded(job.job_id).await?;
                info!(next_job = ?next_job, "Stage succeeded");
                Ok(JobOutcome::Succeeded { next_job })
            }
            Err(e) => {
                let message = failure_message(&e);
                error!(error = %message, "Stage failed");
                if !self.traces.mark_failed(job.trace_id, &message).await? {
                    warn!("Trace was no longer finalizing; status left unchanged");
                }
                self.queue.mark_failed(job.job_id, &message).await?;
                Ok(JobOutcome::Failed { error: message })
            }
        }
    }

    async fn run_stage(&self, stage: QaStage, trace_id: Uuid) -> DomainResult<()> {
        match stage {
            QaStage::RunTests => self.run_tests(trace_id).await,
            QaStage::RunJudge => self.run_judge(trace_id).await,
            QaStage::FinalizeQa => self.finalize_qa(trace_id).await,
        }
    }

    /// Load a trace that a stage is about to work on.
    async fn load_finalizing(&self, trace_id: Uuid) -> DomainResult<Trace> {
        let trace = self
            .traces
            .get(trace_id)
            .await?
            .ok_or_else(|| DomainError::Pipeline(format!("Trace not found: {trace_id}")))?;

        if trace.status != TraceStatus::Finalizing {
            return Err(DomainError::UnexpectedStatus {
                trace_id,
                actual: trace.status,
                expected: TraceStatus::Finalizing,
            });
        }
        Ok(trace)
    }
}

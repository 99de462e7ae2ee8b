//! `qa.finalize_qa`: close out a trace whose QA block is complete.

use tracing::info;
use uuid::Uuid;

use super::QaPipeline;
use crate::domain::errors::{DomainError, DomainResult};

impl QaPipeline {
    pub(super) async fn finalize_qa(&self, trace_id: Uuid) -> DomainResult<()> {
        let trace = self.load_finalizing(trace_id).await?;
        let qa = trace
            .qa
            .ok_or_else(|| DomainError::Pipeline(format!("Trace {trace_id} has no QA data")))?;

        if qa.tests.is_none() {
            return Err(DomainError::Pipeline(format!("Trace {trace_id} missing qa.tests")));
        }
        if qa.judge.is_none() {
            return Err(DomainError::Pipeline(format!("Trace {trace_id} missing qa.judge")));
        }

        self.traces.mark_complete(trace_id).await?;
        info!("QA complete");
        Ok(())
    }
}

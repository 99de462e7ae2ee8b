//! QA pipeline job model.
//!
//! Each pipeline stage runs as one job. A stage enqueues its successor on
//! success; there is no in-process chaining and no retry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The three pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QaStage {
    #[serde(rename = "qa.run_tests")]
    RunTests,
    #[serde(rename = "qa.run_judge")]
    RunJudge,
    #[serde(rename = "qa.finalize_qa")]
    FinalizeQa,
}

impl QaStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RunTests => "qa.run_tests",
            Self::RunJudge => "qa.run_judge",
            Self::FinalizeQa => "qa.finalize_qa",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "qa.run_tests" => Some(Self::RunTests),
            "qa.run_judge" => Some(Self::RunJudge),
            "qa.finalize_qa" => Some(Self::FinalizeQa),
            _ => None,
        }
    }

    /// Stage enqueued after this one succeeds.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::RunTests => Some(Self::RunJudge),
            Self::RunJudge => Some(Self::FinalizeQa),
            Self::FinalizeQa => None,
        }
    }
}

impl fmt::Display for QaStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One named pipeline stage execution for one trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaJob {
    pub job_id: Uuid,
    pub stage: QaStage,
    pub trace_id: Uuid,
    pub status: JobStatus,
    pub error: Option<String>,
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

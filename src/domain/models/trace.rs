//! Trace domain model.
//!
//! A trace is one end-to-end record of a developer's bug-fix session. It is
//! created in `collecting`, accumulates events, and is moved through the QA
//! pipeline once the client finalizes it.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::event::Event;
use super::qa::Qa;

/// Schema version stamped on every trace document.
pub const TRACE_VERSION: &str = "1.0";

/// Lifecycle status of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    /// Accepting event batches
    Collecting,
    /// Finalized by the client; QA pipeline running
    Finalizing,
    /// QA pipeline finished every stage
    Complete,
    /// A QA stage failed; `qa.error` holds the reason
    Failed,
}

impl Default for TraceStatus {
    fn default() -> Self {
        Self::Collecting
    }
}

impl TraceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collecting => "collecting",
            Self::Finalizing => "finalizing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "collecting" => Some(Self::Collecting),
            "finalizing" => Some(Self::Finalizing),
            "complete" | "completed" => Some(Self::Complete),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal states admit no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<TraceStatus> {
        match self {
            Self::Collecting => vec![Self::Finalizing],
            Self::Finalizing => vec![Self::Complete, Self::Failed],
            Self::Complete | Self::Failed => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl fmt::Display for TraceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFingerprint {
    #[serde(default)]
    pub tree_hash: Option<String>,
    #[serde(default)]
    pub dependencies_lock_hash: Option<String>,
}

/// Repository the bug fix was made against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    pub repo_id: String,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    pub commit_base: String,
    #[serde(default)]
    pub repo_fingerprint: Option<RepoFingerprint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugReport {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub repro_steps: Option<String>,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub actual: Option<String>,
    #[serde(default)]
    pub links: Vec<String>,
}

/// The bug being fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceTask {
    #[serde(default)]
    pub task_id: Option<String>,
    pub bug_report: BugReport,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Junior,
    Mid,
    Senior,
    #[default]
    Unknown,
}

impl ExperienceLevel {
    pub const VARIANTS: &'static [&'static str] = &["junior", "mid", "senior", "unknown"];
}

/// What the developer agreed the system may do with the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentFlags {
    #[serde(default = "default_true")]
    pub store_raw_code: bool,
    #[serde(default = "default_true")]
    pub store_terminal_output: bool,
    #[serde(default = "default_true")]
    pub allow_llm_judge: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for ConsentFlags {
    fn default() -> Self {
        Self {
            store_raw_code: true,
            store_terminal_output: true,
            allow_llm_judge: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Developer {
    pub developer_id: String,
    #[serde(default)]
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub consent_flags: ConsentFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ide {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub os: Option<String>,
    pub ide: Ide,
    #[serde(default)]
    pub language: Vec<String>,
    #[serde(default)]
    pub containerized: bool,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrFinalState {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub diff_blob_id: Option<String>,
}

/// Where the developer ended up: head commit and optional pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalState {
    #[serde(default)]
    pub commit_head: Option<String>,
    #[serde(default)]
    pub pr: Option<PrFinalState>,
}

/// Validated body of a trace-creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceCreate {
    pub repo: Repo,
    pub task: TraceTask,
    pub developer: Developer,
    pub environment: Environment,
}

/// Validated body of a finalize request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub final_state: FinalState,
}

/// Full assembled trace document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub trace_version: String,
    pub trace_id: Uuid,
    pub created_at_ms: i64,
    pub finalized_at_ms: Option<i64>,
    pub status: TraceStatus,
    pub repo: Repo,
    pub task: TraceTask,
    pub developer: Developer,
    pub environment: Environment,
    /// Highest accepted event seq (0 before the first batch).
    pub seq_high: u64,
    #[serde(default)]
    pub events: Vec<Event>,
    pub final_state: Option<FinalState>,
    pub qa: Option<Qa>,
}

impl Trace {
    /// Create a new trace in `collecting` from a validated request.
    pub fn new(request: TraceCreate, created_at_ms: i64) -> Self {
        Self {
            trace_version: TRACE_VERSION.to_string(),
            trace_id: Uuid::new_v4(),
            created_at_ms,
            finalized_at_ms: None,
            status: TraceStatus::Collecting,
            repo: request.repo,
            task: request.task,
            developer: request.developer,
            environment: request.environment,
            seq_high: 0,
            events: Vec::new(),
            final_state: None,
            qa: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceCreated {
    pub trace_id: Uuid,
    pub created_at_ms: i64,
    pub status: TraceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsAccepted {
    pub accepted: usize,
    pub seq_high: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFinalized {
    pub trace_id: Uuid,
    pub status: TraceStatus,
    pub qa_job_id: Uuid,
}

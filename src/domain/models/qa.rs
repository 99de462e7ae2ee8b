//! QA result model attached to a trace by the pipeline stages.

use serde::{Deserialize, Serialize};

/// Rubric version recorded on every judge result.
pub const RUBRIC_VERSION: &str = "1.0";

/// One sandboxed test execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestInvocation {
    pub invocation_id: String,
    pub ts_ms: i64,
    pub command: String,
    pub exit_code: i64,
    pub duration_ms: u64,
    pub passed: bool,
    #[serde(default)]
    pub report_blob_id: Option<String>,
    #[serde(default)]
    pub stdout_blob_id: Option<String>,
    #[serde(default)]
    pub stderr_blob_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaTests {
    pub runner: String,
    #[serde(default)]
    pub container_image: Option<String>,
    #[serde(default)]
    pub invocations: Vec<TestInvocation>,
    #[serde(default)]
    pub final_passed: bool,
}

/// Per-dimension rubric scores, each in `[0, 5]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JudgeScores {
    pub root_cause_identification: f64,
    pub plan_quality: f64,
    pub experiment_iterate_loop: f64,
    pub use_of_signals_tests_logs: f64,
    pub minimality_of_fix: f64,
    pub clarity: f64,
}

impl JudgeScores {
    pub const DIMENSIONS: [&'static str; 6] = [
        "root_cause_identification",
        "plan_quality",
        "experiment_iterate_loop",
        "use_of_signals_tests_logs",
        "minimality_of_fix",
        "clarity",
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeFlag {
    HallucinationRisk,
    MissingSteps,
    UnsafeSuggestion,
    IncompleteFix,
    ExemplaryTrace,
}

impl JudgeFlag {
    pub const VARIANTS: &'static [&'static str] = &[
        "hallucination_risk",
        "missing_steps",
        "unsafe_suggestion",
        "incomplete_fix",
        "exemplary_trace",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HallucinationRisk => "hallucination_risk",
            Self::MissingSteps => "missing_steps",
            Self::UnsafeSuggestion => "unsafe_suggestion",
            Self::IncompleteFix => "incomplete_fix",
            Self::ExemplaryTrace => "exemplary_trace",
        }
    }
}

/// Round a score to one decimal place, ties to even (`3.25` becomes `3.2`).
pub fn round_score(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeResult {
    pub model: String,
    pub rubric_version: String,
    pub scores: JudgeScores,
    pub overall: f64,
    #[serde(default)]
    pub rationale_blob_id: Option<String>,
    #[serde(default)]
    pub flags: Vec<JudgeFlag>,
}

/// Shape the evaluator is required to answer with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeOutput {
    pub scores: JudgeScores,
    pub overall: f64,
    pub rationale: String,
    #[serde(default)]
    pub flags: Vec<JudgeFlag>,
}

/// QA block of a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qa {
    #[serde(default = "default_schema_valid")]
    pub schema_valid: bool,
    #[serde(default)]
    pub tests: Option<QaTests>,
    #[serde(default)]
    pub judge: Option<JudgeResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

const fn default_schema_valid() -> bool {
    true
}

impl Default for Qa {
    fn default() -> Self {
        Self {
            schema_valid: true,
            tests: None,
            judge: None,
            error: None,
        }
    }
}

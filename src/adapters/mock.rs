//! In-memory sandbox and evaluator doubles for tests.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::ports::{Evaluator, EvaluatorError, Sandbox, SandboxError, SandboxOutcome, SandboxSpec};

/// What a `MockSandbox` run produces.
#[derive(Debug, Clone)]
pub enum MockRun {
    Exit { exit_code: i64, stdout: String, stderr: String },
    Timeout,
    LaunchError(String),
}

impl MockRun {
    pub fn passing(stdout: impl Into<String>) -> Self {
        Self::Exit {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failing(exit_code: i64, stderr: impl Into<String>) -> Self {
        Self::Exit {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Sandbox that returns a canned result and records every spec it was given.
#[derive(Clone)]
pub struct MockSandbox {
    run: MockRun,
    calls: Arc<Mutex<Vec<SandboxSpec>>>,
}

impl MockSandbox {
    pub fn new(run: MockRun) -> Self {
        Self {
            run,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn calls(&self) -> Vec<SandboxSpec> {
        self.calls.lock().await.clone()
    }
}

impl Default for MockSandbox {
    fn default() -> Self {
        Self::new(MockRun::passing("1 passed\n"))
    }
}

#[async_trait]
impl Sandbox for MockSandbox {
    async fn run(&self, spec: &SandboxSpec) -> Result<SandboxOutcome, SandboxError> {
        self.calls.lock().await.push(spec.clone());
        match &self.run {
            MockRun::Exit { exit_code, stdout, stderr } => Ok(SandboxOutcome {
                exit_code: *exit_code,
                stdout: stdout.clone().into_bytes(),
                stderr: stderr.clone().into_bytes(),
            }),
            MockRun::Timeout => Err(SandboxError::Timeout(spec.timeout)),
            MockRun::LaunchError(msg) => Err(SandboxError::Launch(msg.clone())),
        }
    }
}

/// A well-formed evaluator answer with every score at `score`.
pub fn judge_response(score: f64, rationale: &str) -> String {
    serde_json::json!({
        "scores": {
            "root_cause_identification": score,
            "plan_quality": score,
            "experiment_iterate_loop": score,
            "use_of_signals_tests_logs": score,
            "minimality_of_fix": score,
            "clarity": score
        },
        "overall": score,
        "rationale": rationale,
        "flags": []
    })
    .to_string()
}

/// Evaluator that answers with a fixed string and records `(system, user)` prompts.
#[derive(Clone)]
pub struct MockEvaluator {
    response: Result<String, String>,
    prompts: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockEvaluator {
    pub fn responding(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every call fails with a network error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().await.clone()
    }
}

impl Default for MockEvaluator {
    fn default() -> Self {
        Self::responding(judge_response(4.0, "Methodical debugging with a minimal fix."))
    }
}

#[async_trait]
impl Evaluator for MockEvaluator {
    fn model(&self) -> &str {
        "mock-evaluator"
    }

    async fn evaluate(&self, system: &str, user: &str) -> Result<String, EvaluatorError> {
        self.prompts.lock().await.push((system.to_string(), user.to_string()));
        self.response.clone().map_err(EvaluatorError::Network)
    }
}

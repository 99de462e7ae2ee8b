//! `qa.run_tests`: run the configured test command in the sandbox.

use chrono::Utc;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use super::QaPipeline;
use crate::domain::errors::DomainResult;
use crate::domain::models::{QaTests, TestInvocation, Trace};
use crate::domain::ports::SandboxSpec;

const TEXT_PLAIN: &str = "text/plain";

/// Trace context exported into the container.
pub(super) fn sandbox_env(trace: &Trace) -> Vec<(String, String)> {
    let mut env = vec![
        ("TRACE_ID".to_string(), trace.trace_id.to_string()),
        ("TRACE_REPO_ID".to_string(), trace.repo.repo_id.clone()),
        ("TRACE_COMMIT_BASE".to_string(), trace.repo.commit_base.clone()),
    ];
    if let Some(head) = trace.final_state.as_ref().and_then(|f| f.commit_head.as_ref()) {
        env.push(("TRACE_COMMIT_HEAD".to_string(), head.clone()));
    }
    if let Some(url) = &trace.repo.remote_url {
        env.push(("TRACE_REMOTE_URL".to_string(), url.clone()));
    }
    env
}

impl QaPipeline {
    fn sandbox_spec(&self, trace: &Trace) -> SandboxSpec {
        let config = &self.settings.sandbox;
        SandboxSpec {
            image: config.image.clone(),
            command: config.test_command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            memory_limit: config.memory_limit.clone(),
            env: sandbox_env(trace),
            workspace: config.workspace_path.as_ref().map(PathBuf::from),
        }
    }

    async fn store_output(&self, bytes: &[u8]) -> DomainResult<Option<String>> {
        if bytes.is_empty() {
            return Ok(None);
        }
        let blob = self.artifacts.store(bytes, TEXT_PLAIN).await?;
        Ok(Some(blob.blob_id.to_string()))
    }

    /// Exactly one invocation is recorded. Launch failures and timeouts
    /// become a failing invocation rather than a stage error.
    pub(super) async fn run_tests(&self, trace_id: Uuid) -> DomainResult<()> {
        let trace = self.load_finalizing(trace_id).await?;
        let spec = self.sandbox_spec(&trace);

        let ts_ms = Utc::now().timestamp_millis();
        let started = Instant::now();
        let (exit_code, stdout, stderr) = match self.sandbox.run(&spec).await {
            Ok(outcome) => (outcome.exit_code, outcome.stdout, outcome.stderr),
            Err(e) => {
                warn!(error = %e, "Sandbox run did not complete");
                (1, Vec::new(), e.to_string().into_bytes())
            }
        };
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let passed = exit_code == 0;

        let invocation = TestInvocation {
            invocation_id: Uuid::new_v4().to_string(),
            ts_ms,
            command: spec.command.clone(),
            exit_code,
            duration_ms,
            passed,
            report_blob_id: None,
            stdout_blob_id: self.store_output(&stdout).await?,
            stderr_blob_id: self.store_output(&stderr).await?,
        };
        let tests = QaTests {
            runner: spec.command,
            container_image: Some(spec.image),
            invocations: vec![invocation],
            final_passed: passed,
        };

        self.traces.record_tests(trace_id, &tests).await?;
        info!(passed, exit_code, duration_ms, "Test run recorded");
        Ok(())
    }
}

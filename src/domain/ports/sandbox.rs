//! Test sandbox port.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// What to run and under which limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxSpec {
    pub image: String,
    pub command: String,
    pub timeout: Duration,
    pub memory_limit: String,
    /// Environment passed into the container.
    pub env: Vec<(String, String)>,
    /// Host directory mounted read-only at `/workspace`.
    pub workspace: Option<PathBuf>,
}

/// Result of a run that reached the container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SandboxOutcome {
    pub exit_code: i64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Failed to launch sandbox: {0}")]
    Launch(String),

    #[error("Sandbox timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Sandbox I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Isolated, resource-limited execution environment for tests.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Run `spec.command` to completion or until `spec.timeout` elapses.
    async fn run(&self, spec: &SandboxSpec) -> Result<SandboxOutcome, SandboxError>;
}

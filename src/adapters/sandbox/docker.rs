//! Docker CLI sandbox.
//!
//! Each run gets a uniquely named, network-less container with a read-only
//! root filesystem, a memory ceiling and a small tmpfs at `/tmp`.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::models::SandboxConfig;
use crate::domain::ports::{Sandbox, SandboxError, SandboxOutcome, SandboxSpec};

const TMPFS: &str = "/tmp:size=64M";
const WORKSPACE_MOUNT: &str = "/workspace";

#[derive(Debug, Clone)]
pub struct DockerSandbox {
    binary: String,
}

impl DockerSandbox {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(&config.docker_binary)
    }

    /// Arguments for `docker run` with every isolation flag applied.
    pub fn run_args(container_name: &str, spec: &SandboxSpec) -> Vec<String> {
        let mut args: Vec<String> = [
            "run",
            "--rm",
            "--name",
            container_name,
            "--network",
            "none",
            "--read-only",
            "--memory",
            spec.memory_limit.as_str(),
            "--tmpfs",
            TMPFS,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        for (key, value) in &spec.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }

        if let Some(workspace) = &spec.workspace {
            args.push("-v".to_string());
            args.push(format!("{}:{WORKSPACE_MOUNT}:ro", workspace.display()));
            args.push("-w".to_string());
            args.push(WORKSPACE_MOUNT.to_string());
        }

        args.push(spec.image.clone());
        args.push("sh".to_string());
        args.push("-c".to_string());
        args.push(spec.command.clone());
        args
    }

    async fn force_remove(&self, container_name: &str) {
        let result = Command::new(&self.binary)
            .args(["rm", "-f", container_name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(e) = result {
            warn!(container = container_name, error = %e, "Failed to remove timed-out container");
        }
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    async fn run(&self, spec: &SandboxSpec) -> Result<SandboxOutcome, SandboxError> {
        let container_name = format!("tracesmith-{}", Uuid::new_v4());
        let args = Self::run_args(&container_name, spec);
        debug!(container = %container_name, image = %spec.image, "Starting sandbox");

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SandboxError::Launch(format!("{}: {e}", self.binary)))?;

        match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(SandboxOutcome {
                    exit_code: output.status.code().map_or(1, i64::from),
                    stdout: output.stdout,
                    stderr: output.stderr,
                })
            }
            Err(_) => {
                // The client process is killed on drop; the container outlives it.
                self.force_remove(&container_name).await;
                Err(SandboxError::Timeout(spec.timeout))
            }
        }
    }
}

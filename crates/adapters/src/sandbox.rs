// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox capability: an isolated container owning one agent run.
//!
//! The docker implementation keeps a long-lived container per run with the
//! worktree bind-mounted at `/workspace`, execs the provider command inside
//! it, and escalates from graceful stop to kill on timeout.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Grace interval between SIGTERM and SIGKILL on timeout.
pub const KILL_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("container runtime error: {0}")]
    Runtime(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parameters for a sandbox container.
#[derive(Debug, Clone)]
pub struct SandboxSpec {
    pub name: String,
    pub image: String,
    pub worktree: PathBuf,
    pub env: Vec<(String, String)>,
}

/// A running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxHandle {
    pub container_id: String,
    pub container_name: String,
}

/// Result of one exec inside the sandbox.
#[derive(Debug, Clone, Default)]
pub struct SandboxRun {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Create and start a container for the run.
    async fn create(&self, spec: &SandboxSpec) -> Result<SandboxHandle, SandboxError>;

    /// Exec a command inside the container, streaming stdout lines to
    /// `lines` as they arrive. Honors `timeout` with graceful-then-hard
    /// termination; a timed-out run is returned, not an error.
    async fn exec_streaming(
        &self,
        handle: &SandboxHandle,
        command: &[String],
        timeout: Duration,
        lines: mpsc::Sender<String>,
    ) -> Result<SandboxRun, SandboxError>;

    /// Tear the container down. Idempotent.
    async fn destroy(&self, handle: &SandboxHandle) -> Result<(), SandboxError>;
}

/// Docker-CLI sandbox.
pub struct DockerSandbox {
    /// Image used for agent containers.
    image: String,
}

impl DockerSandbox {
    pub fn new(image: impl Into<String>) -> Self {
        Self { image: image.into() }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    async fn docker(args: &[String]) -> Result<std::process::Output, SandboxError> {
        Command::new("docker")
            .args(args)
            .output()
            .await
            .map_err(|e| SandboxError::Runtime(format!("docker spawn failed: {e}")))
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    async fn create(&self, spec: &SandboxSpec) -> Result<SandboxHandle, SandboxError> {
        let mut args: Vec<String> = vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            spec.name.clone(),
            "-v".into(),
            format!("{}:/workspace", spec.worktree.display()),
            "-w".into(),
            "/workspace".into(),
        ];
        for (key, value) in &spec.env {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }
        let image = if spec.image.is_empty() { self.image.clone() } else { spec.image.clone() };
        args.push(image);
        // Keep the container alive; work happens via exec.
        args.push("sleep".into());
        args.push("infinity".into());

        let output = Self::docker(&args).await?;
        if !output.status.success() {
            return Err(SandboxError::Runtime(format!(
                "docker run failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(SandboxHandle { container_id, container_name: spec.name.clone() })
    }

    async fn exec_streaming(
        &self,
        handle: &SandboxHandle,
        command: &[String],
        timeout: Duration,
        lines: mpsc::Sender<String>,
    ) -> Result<SandboxRun, SandboxError> {
        let mut cmd = Command::new("docker");
        cmd.arg("exec").arg(&handle.container_id).args(command);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| SandboxError::Runtime(format!("docker exec spawn failed: {e}")))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            SandboxError::Runtime("docker exec produced no stdout pipe".to_string())
        })?;
        let stderr = child.stderr.take();

        let collector = tokio::spawn(async move {
            let mut collected = String::new();
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                collected.push_str(&line);
                collected.push('\n');
                let _ = lines.send(line).await;
            }
            collected
        });
        let stderr_collector = tokio::spawn(async move {
            let mut collected = String::new();
            if let Some(stderr) = stderr {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    collected.push_str(&line);
                    collected.push('\n');
                }
            }
            collected
        });

        let timed_out = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => {
                let status = status
                    .map_err(|e| SandboxError::Runtime(format!("docker exec wait failed: {e}")))?;
                let stdout = collector.await.unwrap_or_default();
                let stderr = stderr_collector.await.unwrap_or_default();
                return Ok(SandboxRun {
                    exit_code: status.code().unwrap_or(-1),
                    stdout,
                    stderr,
                    timed_out: false,
                });
            }
            Err(_) => true,
        };

        // Timeout path: graceful stop, then kill after the grace interval.
        tracing::warn!(container = %handle.container_name, "agent exec timed out, stopping container");
        let _ = Self::docker(&[
            "stop".into(),
            "-t".into(),
            KILL_GRACE.as_secs().to_string(),
            handle.container_id.clone(),
        ])
        .await;
        let _ = child.kill().await;
        let stdout = collector.await.unwrap_or_default();
        let stderr = stderr_collector.await.unwrap_or_default();
        Ok(SandboxRun { exit_code: -1, stdout, stderr, timed_out })
    }

    async fn destroy(&self, handle: &SandboxHandle) -> Result<(), SandboxError> {
        let output =
            Self::docker(&["rm".into(), "-f".into(), handle.container_id.clone()]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // Already gone is fine.
            if !stderr.contains("No such container") {
                tracing::warn!(container = %handle.container_name, stderr = %stderr.trim(), "container removal failed");
            }
        }
        Ok(())
    }
}

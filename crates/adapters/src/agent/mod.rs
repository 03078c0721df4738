// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coding-agent capability.

mod prompt;
mod provider;
mod sandbox_agent;
mod usage;

pub use prompt::issue_prompt;
pub use provider::provider_command;
pub use sandbox_agent::SandboxAgent;
pub use usage::parse_usage_limit_reset;

use crate::sandbox::SandboxError;
use async_trait::async_trait;
use gitfix_core::{AgentEvent, AgentOutcome, AgentRequest};
use thiserror::Error;
use tokio::sync::mpsc;

/// Hard errors raised before an outcome can be produced (the run itself
/// reports success/failure/usage-limit through [`AgentOutcome`]).
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error("agent misconfigured: {0}")]
    Configuration(String),
}

/// Provider-agnostic execution of an AI coding session against a prepared
/// worktree.
///
/// The agent is advisory about file changes: callers treat success as "the
/// working tree may differ; diff it to find out".
#[async_trait]
pub trait CodingAgent: Send + Sync {
    /// Run one coding session. Streaming events (session id, container id,
    /// output lines) arrive on `events` while the run is in flight.
    async fn execute(
        &self,
        request: AgentRequest,
        events: mpsc::Sender<AgentEvent>,
    ) -> Result<AgentOutcome, AgentError>;

    /// Verify credentials/config without running anything.
    fn validate_configuration(&self) -> Result<(), AgentError>;

    /// Prepare provider infrastructure (images, networks) ahead of runs.
    async fn build_infrastructure(&self) -> Result<(), AgentError> {
        Ok(())
    }

    fn provider_name(&self) -> &'static str;
}

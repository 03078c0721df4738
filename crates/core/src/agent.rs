// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coding-agent request/outcome types.
//!
//! The outcome is a sum type rather than an exception hierarchy: the
//! processor pattern-matches on it, and only `Failed` participates in the
//! queue's retry budget. `UsageLimit` carries the provider reset timestamp
//! and is handled by requeue-with-delay.

use crate::issue::{IssueDetails, IssueRef};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Request handed to a [`CodingAgent`] capability.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub worktree_path: PathBuf,
    pub issue: IssueRef,
    pub github_token: String,
    pub model_name: String,
    pub branch_name: Option<String>,
    pub issue_details: Option<IssueDetails>,
    /// Replaces the default issue-derived prompt entirely.
    pub custom_prompt: Option<String>,
    pub is_retry: bool,
    pub retry_reason: Option<String>,
}

impl AgentRequest {
    pub fn new(
        worktree_path: impl Into<PathBuf>,
        issue: IssueRef,
        github_token: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            worktree_path: worktree_path.into(),
            issue,
            github_token: github_token.into(),
            model_name: model_name.into(),
            branch_name: None,
            issue_details: None,
            custom_prompt: None,
            is_retry: false,
            retry_reason: None,
        }
    }

    crate::setters! {
        set {
            is_retry: bool,
        }
        option {
            branch_name: String,
            issue_details: IssueDetails,
            custom_prompt: String,
            retry_reason: String,
        }
    }
}

/// A completed agent run (the agent process exited on its own).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRun {
    pub success: bool,
    pub execution_time_ms: u64,
    pub exit_code: i32,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub raw_output: String,
    #[serde(default)]
    pub logs: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conversation_log: Vec<String>,
    /// Advisory only. The processor diffs the worktree to find the truth.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modified_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_commit_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub turns: u32,
    #[serde(default)]
    pub cost_usd: f64,
    /// True when the run ended because the provider's turn cap was hit.
    #[serde(default)]
    pub max_turns_reached: bool,
}

/// Failure kinds an agent run can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentFailureKind {
    Spawn,
    Timeout,
    Provider,
    Sandbox,
}

crate::simple_display! {
    AgentFailureKind {
        Spawn => "spawn",
        Timeout => "timeout",
        Provider => "provider",
        Sandbox => "sandbox",
    }
}

/// Outcome of one agent execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AgentOutcome {
    Ok(AgentRun),
    /// Provider quota exhausted; not a failure. `reset_at_epoch_secs` is
    /// parsed from the provider response.
    UsageLimit { reset_at_epoch_secs: u64 },
    Failed { kind: AgentFailureKind, message: String },
}

impl AgentOutcome {
    pub fn run(&self) -> Option<&AgentRun> {
        match self {
            AgentOutcome::Ok(run) => Some(run),
            _ => None,
        }
    }
}

/// Streaming events emitted while an agent runs.
///
/// The processor drains these into the store's pub/sub channels; the
/// external dashboard attaches there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    SessionStarted { session_id: String },
    ContainerStarted { container_id: String, container_name: String },
    OutputChunk { line: String },
    DiffChunk { diff: String },
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;

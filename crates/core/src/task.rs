// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task state record read by the dashboard.
//!
//! TaskId is derived from the issue coordinates and the resolved model, so
//! parallel runs of the same issue under different models stay distinct.
//! The job id, by contrast, changes on every requeue.

use crate::id::CorrelationId;
use crate::issue::IssueRef;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Identifier for a task: `{owner}-{repo}-{issue#}-{model}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the model-qualified task id for an issue.
    pub fn for_issue(issue: &IssueRef, model: &str) -> Self {
        Self(format!("{}-{}-{}-{}", issue.repo_owner, issue.repo_name, issue.number, model))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Stage of the per-task state machine. Stages form a DAG; transitions are
/// append-only and terminal stages are COMPLETED and FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStage {
    Created,
    Setup,
    Processing,
    ClaudeExecution,
    GitOperations,
    PostProcessing,
    Completed,
    Failed,
}

crate::simple_display! {
    TaskStage {
        Created => "CREATED",
        Setup => "SETUP",
        Processing => "PROCESSING",
        ClaudeExecution => "CLAUDE_EXECUTION",
        GitOperations => "GIT_OPERATIONS",
        PostProcessing => "POST_PROCESSING",
        Completed => "COMPLETED",
        Failed => "FAILED",
    }
}

impl TaskStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStage::Completed | TaskStage::Failed)
    }
}

/// One append-only history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHistoryEntry {
    pub stage: TaskStage,
    pub at_epoch_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Free-form per-entry metadata (e.g. commit hash, PR url at this stage).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Subsystem metadata accumulated over the task's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<String>,
}

impl TaskMetadata {
    /// Merge non-empty fields of `other` over self.
    pub fn merge(&mut self, other: &TaskMetadata) {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field.clone();
                }
            };
        }
        take!(session_id);
        take!(conversation_id);
        take!(container_id);
        take!(container_name);
        take!(model);
        take!(pull_request_url);
        take!(error_category);
    }
}

/// The task record persisted under `worker:state:{taskId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub task_id: TaskId,
    pub stage: TaskStage,
    pub issue: IssueRef,
    pub correlation_id: CorrelationId,
    pub history: Vec<TaskHistoryEntry>,
    #[serde(default)]
    pub metadata: TaskMetadata,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl TaskState {
    pub fn new(
        task_id: TaskId,
        issue: IssueRef,
        correlation_id: CorrelationId,
        epoch_ms: u64,
    ) -> Self {
        Self {
            task_id,
            stage: TaskStage::Created,
            issue,
            correlation_id,
            history: vec![TaskHistoryEntry {
                stage: TaskStage::Created,
                at_epoch_ms: epoch_ms,
                reason: None,
                metadata: BTreeMap::new(),
            }],
            metadata: TaskMetadata::default(),
            created_at_ms: epoch_ms,
            updated_at_ms: epoch_ms,
        }
    }

    /// Append a history entry and move to `stage`.
    pub fn transition(&mut self, stage: TaskStage, reason: Option<String>, epoch_ms: u64) {
        self.history.push(TaskHistoryEntry {
            stage,
            at_epoch_ms: epoch_ms,
            reason,
            metadata: BTreeMap::new(),
        });
        self.stage = stage;
        self.updated_at_ms = epoch_ms;
    }

    /// Merge metadata into the most recent history entry for `stage`
    /// without changing the current stage.
    pub fn merge_history_metadata(
        &mut self,
        stage: TaskStage,
        metadata: BTreeMap<String, serde_json::Value>,
        epoch_ms: u64,
    ) {
        if let Some(entry) = self.history.iter_mut().rev().find(|e| e.stage == stage) {
            entry.metadata.extend(metadata);
            self.updated_at_ms = epoch_ms;
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

crate::builder! {
    pub struct TaskStateBuilder => TaskState {
        into {
            task_id: TaskId = "acme-widget-42-sonnet",
        }
        set {
            stage: TaskStage = TaskStage::Created,
            issue: IssueRef = IssueRef::new("acme", "widget", 42),
            correlation_id: CorrelationId = CorrelationId::from_string("corr-test"),
            history: Vec<TaskHistoryEntry> = Vec::new(),
            metadata: TaskMetadata = TaskMetadata::default(),
            created_at_ms: u64 = 0,
            updated_at_ms: u64 = 0,
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue job envelope, kinds and per-kind payloads.

use crate::id::{CorrelationId, JobId};
use crate::issue::{Comment, IssueRef};
use serde::{Deserialize, Serialize};

/// Job kind routed by the worker runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Implement a tagged issue end to end (worktree, agent, PR).
    ImplementIssue,
    /// Apply reviewer follow-up comments to a PR the service authored.
    ApplyPrFollowup,
    /// Seed task state for externally-tracked work; no forge interaction.
    ImportTask,
}

crate::simple_display! {
    JobKind {
        ImplementIssue => "implement_issue",
        ApplyPrFollowup => "apply_pr_followup",
        ImportTask => "import_task",
    }
}

/// Payload for an `ImplementIssue` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuePayload {
    pub issue: IssueRef,
    /// Overrides the repo's default branch as the worktree base.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_branch: Option<String>,
}

/// Payload for an `ApplyPrFollowup` job.
///
/// Batch form carries every comment the producer saw; the single-comment
/// form is a batch of one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowupPayload {
    pub pull_request_number: u64,
    pub branch_name: String,
    pub repo_owner: String,
    pub repo_name: String,
    /// Model short name or canonical id requested for the follow-up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    pub comments: Vec<Comment>,
}

/// Payload for an `ImportTask` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPayload {
    pub issue: IssueRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Typed payload union, tagged by the kind it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    ImplementIssue(IssuePayload),
    ApplyPrFollowup(FollowupPayload),
    ImportTask(ImportPayload),
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::ImplementIssue(_) => JobKind::ImplementIssue,
            JobPayload::ApplyPrFollowup(_) => JobKind::ApplyPrFollowup,
            JobPayload::ImportTask(_) => JobKind::ImportTask,
        }
    }
}

/// Queue-owned lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

crate::simple_display! {
    JobState {
        Waiting => "waiting",
        Delayed => "delayed",
        Active => "active",
        Completed => "completed",
        Failed => "failed",
    }
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Retention window for finished jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionWindow {
    /// Maximum age in milliseconds before a finished job is pruned.
    pub age_ms: u64,
    /// Maximum number of finished jobs to keep (None = unbounded by count).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

pub const HOUR_MS: u64 = 60 * 60 * 1000;
pub const DAY_MS: u64 = 24 * HOUR_MS;

/// Options accepted at enqueue time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Total attempts before the job lands in the failed set.
    pub attempts: u32,
    /// Exponential backoff base in milliseconds (delay = base * 2^(attempt-1)).
    pub backoff_base_ms: u64,
    /// Initial delay before the job becomes ready.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    /// Lower value is served first within the ready set.
    #[serde(default)]
    pub priority: i32,
    pub remove_on_complete: RetentionWindow,
    pub remove_on_fail: RetentionWindow,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_base_ms: 2000,
            delay_ms: None,
            priority: 0,
            remove_on_complete: RetentionWindow { age_ms: DAY_MS, count: Some(1000) },
            remove_on_fail: RetentionWindow { age_ms: 7 * DAY_MS, count: None },
        }
    }
}

impl JobOptions {
    crate::setters! {
        set {
            attempts: u32,
            backoff_base_ms: u64,
            priority: i32,
        }
        option {
            delay_ms: u64,
        }
    }

    /// Backoff for the attempt that just failed (1-based).
    pub fn backoff_ms(&self, attempts_made: u32) -> u64 {
        let exp = attempts_made.saturating_sub(1).min(16);
        self.backoff_base_ms.saturating_mul(1u64 << exp)
    }
}

/// A job as stored by the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub job_id: JobId,
    pub payload: JobPayload,
    pub state: JobState,
    /// Attempts started so far (0 until first claim).
    pub attempt: u32,
    pub options: JobOptions,
    pub enqueued_at_ms: u64,
    /// Epoch ms before which the job must not be served.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delayed_until_ms: Option<u64>,
    /// Coarse progress indication, 0..=100.
    #[serde(default)]
    pub progress: u8,
    /// Last recorded handler error, for the failed set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
}

impl JobEnvelope {
    pub fn new(payload: JobPayload, options: JobOptions, enqueued_at_ms: u64) -> Self {
        let delayed_until_ms = options.delay_ms.map(|d| enqueued_at_ms + d);
        let state = if delayed_until_ms.is_some() { JobState::Delayed } else { JobState::Waiting };
        Self {
            job_id: JobId::new(),
            payload,
            state,
            attempt: 0,
            options,
            enqueued_at_ms,
            delayed_until_ms,
            progress: 0,
            last_error: None,
            finished_at_ms: None,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }

    /// True once every configured attempt has been consumed.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempt >= self.options.attempts
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree cleanup policy and the retention sidecar.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Sidecar filename written into retained worktrees.
pub const RETENTION_FILE: &str = "RETENTION.json";

/// What happens to a worktree once its job finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionStrategy {
    /// Remove the worktree; the branch is deleted only when the job failed
    /// (a successful branch lives on in its PR).
    #[default]
    AlwaysDelete,
    /// Keep failed worktrees for manual inspection.
    KeepOnFailure,
    /// Keep every worktree until a scheduled deadline; the sweeper reaps.
    KeepForHours,
}

gitfix_core::simple_display! {
    RetentionStrategy {
        AlwaysDelete => "always_delete",
        KeepOnFailure => "keep_on_failure",
        KeepForHours => "keep_for_hours",
    }
}

#[derive(Debug, Error)]
#[error("unknown retention strategy: {0}")]
pub struct ParseStrategyError(String);

impl std::str::FromStr for RetentionStrategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always_delete" => Ok(RetentionStrategy::AlwaysDelete),
            "keep_on_failure" => Ok(RetentionStrategy::KeepOnFailure),
            "keep_for_hours" => Ok(RetentionStrategy::KeepForHours),
            other => Err(ParseStrategyError(other.to_string())),
        }
    }
}

/// Contents of `RETENTION.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionSidecar {
    pub written_at_ms: u64,
    pub issue_number: u64,
    pub success: bool,
    /// Epoch ms after which the sweeper may delete the worktree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_cleanup_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl RetentionSidecar {
    pub async fn write(&self, worktree: &Path) -> std::io::Result<()> {
        let raw = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(worktree.join(RETENTION_FILE), raw).await
    }

    pub async fn read(worktree: &Path) -> Option<Self> {
        let raw = tokio::fs::read(worktree.join(RETENTION_FILE)).await.ok()?;
        serde_json::from_slice(&raw).ok()
    }
}

#[cfg(test)]
#[path = "retention_tests.rs"]
mod tests;

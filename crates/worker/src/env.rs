// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the worker.

use gitfix_core::WorkerId;
use gitfix_workspace::RetentionStrategy;
use std::path::PathBuf;

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    var(name).and_then(|s| s.parse().ok())
}

/// Worker configuration, resolved once at boot.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// KV/PubSub endpoint, reported for operators; the in-process store is
    /// the single-binary default.
    pub redis_host: String,
    pub redis_port: u16,
    pub concurrency: usize,
    pub queue_name: String,
    /// Issues must carry this label to be processed.
    pub primary_tag: String,
    /// Added while a job runs; always removed on terminal failure.
    pub processing_tag: String,
    /// Added once a job finishes; its presence skips reprocessing.
    pub done_tag: String,
    pub default_model: String,
    /// Padding added past the provider's quota reset before requeue.
    pub requeue_buffer_ms: u64,
    /// Random jitter on top of the buffer.
    pub requeue_jitter_ms: u64,
    pub retention_strategy: RetentionStrategy,
    pub retention_hours: u64,
    /// Sweeper reaps retained worktrees older than this.
    pub max_age_hours: u64,
    pub cost_threshold_usd: f64,
    pub clones_base: PathBuf,
    pub worktrees_base: PathBuf,
    pub default_branch: String,
    pub gh_app_id: Option<u64>,
    pub gh_private_key_path: Option<PathBuf>,
    pub gh_installation_id: Option<u64>,
    /// Bot login excluded from issue-comment context.
    pub bot_username: Option<String>,
    pub worker_id: WorkerId,
    pub hostname: String,
    /// Label applied to PRs the worker opens.
    pub pr_label: String,
    /// Base URL repositories are cloned from.
    pub forge_base_url: String,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let hostname = var("HOSTNAME").unwrap_or_else(|| "worker".to_string());
        let worker_id = var("WORKER_ID")
            .map(WorkerId::new)
            .unwrap_or_else(|| WorkerId::generate(&hostname));

        Self {
            redis_host: var("REDIS_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            redis_port: parse_var("REDIS_PORT").unwrap_or(6379),
            concurrency: parse_var("WORKER_CONCURRENCY").unwrap_or(3),
            queue_name: var("GITHUB_ISSUE_QUEUE_NAME")
                .unwrap_or_else(|| "github-issues".to_string()),
            primary_tag: var("AI_PRIMARY_TAG").unwrap_or_else(|| "AI".to_string()),
            processing_tag: var("AI_PROCESSING_TAG")
                .unwrap_or_else(|| "AI-processing".to_string()),
            done_tag: var("AI_DONE_TAG").unwrap_or_else(|| "AI-done".to_string()),
            default_model: var("DEFAULT_CLAUDE_MODEL")
                .unwrap_or_else(|| "claude-sonnet-4".to_string()),
            requeue_buffer_ms: parse_var("REQUEUE_BUFFER_MS").unwrap_or(5 * 60 * 1000),
            requeue_jitter_ms: parse_var("REQUEUE_JITTER_MS").unwrap_or(2 * 60 * 1000),
            retention_strategy: var("WORKTREE_RETENTION_STRATEGY")
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            retention_hours: parse_var("WORKTREE_RETENTION_HOURS").unwrap_or(24),
            max_age_hours: parse_var("WORKTREE_MAX_AGE_HOURS").unwrap_or(48),
            cost_threshold_usd: parse_var("LLM_COST_THRESHOLD_USD").unwrap_or(5.0),
            clones_base: var("GIT_CLONES_BASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/clones")),
            worktrees_base: var("GIT_WORKTREES_BASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/worktrees")),
            default_branch: var("GIT_DEFAULT_BRANCH").unwrap_or_else(|| "main".to_string()),
            gh_app_id: parse_var("GH_APP_ID"),
            gh_private_key_path: var("GH_PRIVATE_KEY_PATH").map(PathBuf::from),
            gh_installation_id: parse_var("GH_INSTALLATION_ID"),
            bot_username: var("GITHUB_BOT_USERNAME"),
            worker_id,
            hostname,
            pr_label: var("GITFIX_PR_LABEL").unwrap_or_else(|| "gitfix".to_string()),
            forge_base_url: var("GIT_FORGE_BASE_URL")
                .unwrap_or_else(|| "https://github.com".to_string()),
        }
    }

    /// Clone URL for a repository on the forge.
    pub fn repo_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/{owner}/{repo}.git", self.forge_base_url)
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clone cache and worktree lifecycle.

use crate::branch::{branch_name, is_valid_branch_name, worktree_dir_name, BranchParts};
use crate::retention::{RetentionSidecar, RetentionStrategy};
use crate::subprocess::{
    git, is_lock_error, run_with_timeout, SubprocessError, GIT_LOCAL_TIMEOUT, GIT_REMOTE_TIMEOUT,
};
use async_trait::async_trait;
use gitfix_core::Clock;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
    #[error("git {op} failed: {stderr}")]
    Git { op: String, stderr: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid branch name: {0}")]
    InvalidBranch(String),
    #[error("{0} exists but is not a git repository; refusing to touch it")]
    NotARepository(PathBuf),
    #[error("token refresh failed: {0}")]
    TokenRefresh(String),
}

/// A prepared working copy on a dedicated branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub local_repo_path: PathBuf,
    pub worktree_path: PathBuf,
    pub branch_name: String,
    pub base_branch: String,
}

/// Commit identity. The agent never authors its own commits.
#[derive(Debug, Clone)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

impl CommitAuthor {
    pub fn claude_code() -> Self {
        Self {
            name: "Claude Code".to_string(),
            email: "claude-code@anthropic.com".to_string(),
        }
    }
}

/// Source for a fresh installation token when a push hits an expired one.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fresh_token(&self) -> Result<String, String>;
}

/// Options for [`WorkspaceManager::push_branch`].
pub struct PushOptions {
    pub repo_url: String,
    pub auth_token: String,
    pub refresh: Option<Arc<dyn TokenSource>>,
}

/// Options for [`WorkspaceManager::cleanup_worktree`].
#[derive(Debug, Clone)]
pub struct CleanupOptions {
    pub delete_branch: bool,
    pub success: bool,
    pub strategy: RetentionStrategy,
    /// Used by the `keep_for_hours` strategy.
    pub retention_hours: u64,
    pub issue_number: u64,
}

/// Snapshot of the worktree's divergence from HEAD.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeDiff {
    pub status: String,
    pub unified: String,
    pub changed_files: Vec<String>,
}

impl WorktreeDiff {
    pub fn is_empty(&self) -> bool {
        self.status.trim().is_empty()
    }
}

/// Manages the shared clone cache and per-job worktrees.
pub struct WorkspaceManager<C: Clock> {
    clones_base: PathBuf,
    worktrees_base: PathBuf,
    default_branch: String,
    clock: C,
}

impl<C: Clock> WorkspaceManager<C> {
    pub fn new(
        clones_base: impl Into<PathBuf>,
        worktrees_base: impl Into<PathBuf>,
        default_branch: impl Into<String>,
        clock: C,
    ) -> Self {
        Self {
            clones_base: clones_base.into(),
            worktrees_base: worktrees_base.into(),
            default_branch: default_branch.into(),
            clock,
        }
    }

    pub fn worktrees_base(&self) -> &Path {
        &self.worktrees_base
    }

    /// Local clone path for a repository.
    pub fn clone_path(&self, owner: &str, repo: &str) -> PathBuf {
        self.clones_base.join(owner).join(format!("{repo}.git"))
    }

    /// Ensure the shared bare clone exists and is fresh. Idempotent.
    ///
    /// An existing path that is not a repository is an error; this code
    /// never attempts destructive recovery on an operator's disk.
    pub async fn ensure_clone(
        &self,
        repo_url: &str,
        owner: &str,
        repo: &str,
        auth_token: &str,
    ) -> Result<PathBuf, WorkspaceError> {
        let path = self.clone_path(owner, repo);
        let authed = authed_url(repo_url, auth_token);

        if !path.exists() {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            self.with_network_retry("git clone", || {
                let mut cmd = tokio::process::Command::new("git");
                cmd.args(["clone", "--bare", &authed])
                    .arg(&path)
                    .env_remove("GIT_DIR")
                    .env_remove("GIT_WORK_TREE");
                cmd
            })
            .await?;
            // Leave a token-free URL behind; credentials are injected per
            // network operation.
            let output = run_with_timeout(
                {
                    let mut cmd = git(&path);
                    cmd.args(["remote", "set-url", "origin", repo_url]);
                    cmd
                },
                GIT_LOCAL_TIMEOUT,
                "git remote set-url",
            )
            .await?;
            check(output, "remote set-url")?;
            tracing::info!(repo = %format!("{owner}/{repo}"), path = %path.display(), "created local clone");
            return Ok(path);
        }

        let probe = run_with_timeout(
            {
                let mut cmd = git(&path);
                cmd.args(["rev-parse", "--git-dir"]);
                cmd
            },
            GIT_LOCAL_TIMEOUT,
            "git rev-parse",
        )
        .await?;
        if !probe.status.success() {
            return Err(WorkspaceError::NotARepository(path));
        }

        self.with_network_retry("git fetch", || {
            let mut cmd = git(&path);
            cmd.args(["fetch", "--prune", &authed, "+refs/heads/*:refs/heads/*"]);
            cmd
        })
        .await?;
        Ok(path)
    }

    /// Allocate a fresh worktree and branch for an issue.
    pub async fn create_worktree_for_issue(
        &self,
        local_repo_path: &Path,
        issue_number: u64,
        title: &str,
        owner: &str,
        repo: &str,
        base_branch: Option<String>,
        model_name: Option<String>,
    ) -> Result<Workspace, WorkspaceError> {
        let base = base_branch.unwrap_or_else(|| self.default_branch.clone());
        let branch = branch_name(&BranchParts {
            issue_number,
            title: title.to_string(),
            model: model_name,
            epoch_ms: self.clock.epoch_ms(),
        });
        if !is_valid_branch_name(&branch) {
            return Err(WorkspaceError::InvalidBranch(branch));
        }

        let worktree_path = self
            .worktrees_base
            .join(format!("{owner}-{repo}"))
            .join(worktree_dir_name(&branch));
        if let Some(parent) = worktree_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.worktree_add(local_repo_path, &worktree_path, Some(&branch), &base).await?;
        tracing::info!(branch = %branch, path = %worktree_path.display(), "worktree created");

        Ok(Workspace {
            local_repo_path: local_repo_path.to_path_buf(),
            worktree_path,
            branch_name: branch,
            base_branch: base,
        })
    }

    /// Check out an already-pushed branch into a fresh worktree
    /// (the follow-up path).
    pub async fn create_worktree_from_existing_branch(
        &self,
        local_repo_path: &Path,
        branch: &str,
        dir_name: &str,
        owner: &str,
        repo: &str,
    ) -> Result<Workspace, WorkspaceError> {
        if !is_valid_branch_name(branch) {
            return Err(WorkspaceError::InvalidBranch(branch.to_string()));
        }
        let worktree_path = self.worktrees_base.join(format!("{owner}-{repo}")).join(dir_name);
        if let Some(parent) = worktree_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.worktree_add(local_repo_path, &worktree_path, None, branch).await?;

        Ok(Workspace {
            local_repo_path: local_repo_path.to_path_buf(),
            worktree_path,
            branch_name: branch.to_string(),
            base_branch: branch.to_string(),
        })
    }

    /// `git worktree add`, retrying once on a transient lock error.
    async fn worktree_add(
        &self,
        repo: &Path,
        worktree: &Path,
        new_branch: Option<&str>,
        start_point: &str,
    ) -> Result<(), WorkspaceError> {
        for attempt in 0..2 {
            let mut cmd = git(repo);
            cmd.arg("worktree").arg("add");
            if let Some(branch) = new_branch {
                cmd.args(["-b", branch]);
            }
            cmd.arg(worktree).arg(start_point);
            let output = run_with_timeout(cmd, GIT_LOCAL_TIMEOUT, "git worktree add").await?;
            if output.status.success() {
                return Ok(());
            }
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if attempt == 0 && is_lock_error(&stderr) {
                tracing::warn!(stderr = %stderr.trim(), "worktree add hit a lock, retrying once");
                tokio::time::sleep(Duration::from_millis(500)).await;
                continue;
            }
            return Err(WorkspaceError::Git { op: "worktree add".to_string(), stderr });
        }
        unreachable!("loop always returns")
    }

    /// Stage everything and commit. Returns `None` when the tree is clean;
    /// never creates an empty commit.
    pub async fn commit_changes(
        &self,
        workspace: &Workspace,
        message: &str,
        author: &CommitAuthor,
    ) -> Result<Option<String>, WorkspaceError> {
        let wt = &workspace.worktree_path;
        let output = run_with_timeout(
            {
                let mut cmd = git(wt);
                cmd.args(["add", "-A"]);
                cmd
            },
            GIT_LOCAL_TIMEOUT,
            "git add",
        )
        .await?;
        check(output, "add")?;

        if !self.has_changes_staged(wt).await? {
            return Ok(None);
        }

        let output = run_with_timeout(
            {
                let mut cmd = git(wt);
                cmd.args([
                    "-c",
                    &format!("user.name={}", author.name),
                    "-c",
                    &format!("user.email={}", author.email),
                    "commit",
                    "-m",
                    message,
                ]);
                cmd
            },
            GIT_LOCAL_TIMEOUT,
            "git commit",
        )
        .await?;
        check(output, "commit")?;

        let output = run_with_timeout(
            {
                let mut cmd = git(wt);
                cmd.args(["rev-parse", "HEAD"]);
                cmd
            },
            GIT_LOCAL_TIMEOUT,
            "git rev-parse",
        )
        .await?;
        let hash = String::from_utf8_lossy(&check(output, "rev-parse")?.stdout).trim().to_string();
        Ok(Some(hash))
    }

    async fn has_changes_staged(&self, worktree: &Path) -> Result<bool, WorkspaceError> {
        let output = run_with_timeout(
            {
                let mut cmd = git(worktree);
                cmd.args(["status", "--porcelain"]);
                cmd
            },
            GIT_LOCAL_TIMEOUT,
            "git status",
        )
        .await?;
        let output = check(output, "status")?;
        Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
    }

    /// True when the working tree differs from HEAD (staged or not).
    pub async fn has_changes(&self, workspace: &Workspace) -> Result<bool, WorkspaceError> {
        self.has_changes_staged(&workspace.worktree_path).await
    }

    /// Capture porcelain status plus a unified diff for publication.
    pub async fn capture_diff(&self, workspace: &Workspace) -> Result<WorktreeDiff, WorkspaceError> {
        let wt = &workspace.worktree_path;
        let status_out = run_with_timeout(
            {
                let mut cmd = git(wt);
                cmd.args(["status", "--porcelain"]);
                cmd
            },
            GIT_LOCAL_TIMEOUT,
            "git status",
        )
        .await?;
        let status = String::from_utf8_lossy(&check(status_out, "status")?.stdout).to_string();

        let diff_out = run_with_timeout(
            {
                let mut cmd = git(wt);
                cmd.args(["diff", "HEAD"]);
                cmd
            },
            GIT_LOCAL_TIMEOUT,
            "git diff",
        )
        .await?;
        // `git diff HEAD` fails on an unborn branch; treat that as empty.
        let unified = if diff_out.status.success() {
            String::from_utf8_lossy(&diff_out.stdout).to_string()
        } else {
            String::new()
        };

        let changed_files = status
            .lines()
            .filter_map(|line| line.get(3..).map(str::to_string))
            .collect();
        Ok(WorktreeDiff { status, unified, changed_files })
    }

    /// Push the branch to origin. On an auth-expired error with a refresh
    /// source present, retries exactly once with a fresh token.
    pub async fn push_branch(
        &self,
        workspace: &Workspace,
        branch: &str,
        opts: &PushOptions,
    ) -> Result<(), WorkspaceError> {
        match self.push_once(workspace, branch, &opts.repo_url, &opts.auth_token).await {
            Ok(()) => Ok(()),
            Err(WorkspaceError::Git { ref stderr, .. })
                if is_auth_error(stderr) && opts.refresh.is_some() =>
            {
                tracing::warn!(branch = %branch, "push auth failed, retrying with refreshed token");
                let refresh = opts.refresh.as_ref().ok_or_else(|| {
                    WorkspaceError::TokenRefresh("refresh source vanished".to_string())
                })?;
                let token = refresh.fresh_token().await.map_err(WorkspaceError::TokenRefresh)?;
                self.push_once(workspace, branch, &opts.repo_url, &token).await
            }
            Err(e) => Err(e),
        }
    }

    async fn push_once(
        &self,
        workspace: &Workspace,
        branch: &str,
        repo_url: &str,
        token: &str,
    ) -> Result<(), WorkspaceError> {
        let authed = authed_url(repo_url, token);
        let output = run_with_timeout(
            {
                let mut cmd = git(&workspace.worktree_path);
                cmd.args(["push", &authed, &format!("{branch}:refs/heads/{branch}")]);
                cmd
            },
            GIT_REMOTE_TIMEOUT,
            "git push",
        )
        .await?;
        check(output, "push").map(|_| ())
    }

    /// Apply the retention policy to a finished job's worktree.
    pub async fn cleanup_worktree(
        &self,
        local_repo_path: &Path,
        worktree_path: &Path,
        branch: &str,
        opts: &CleanupOptions,
    ) -> Result<(), WorkspaceError> {
        match opts.strategy {
            RetentionStrategy::AlwaysDelete => {
                self.remove_worktree(local_repo_path, worktree_path).await;
                if opts.delete_branch && !opts.success {
                    self.delete_branch(local_repo_path, branch).await;
                }
            }
            RetentionStrategy::KeepOnFailure => {
                if opts.success {
                    self.remove_worktree(local_repo_path, worktree_path).await;
                } else {
                    let sidecar = RetentionSidecar {
                        written_at_ms: self.clock.epoch_ms(),
                        issue_number: opts.issue_number,
                        success: false,
                        scheduled_cleanup_ms: None,
                        branch: Some(branch.to_string()),
                    };
                    if let Err(e) = sidecar.write(worktree_path).await {
                        tracing::warn!(error = %e, "failed to write retention sidecar");
                    }
                    tracing::info!(path = %worktree_path.display(), "keeping failed worktree for inspection");
                }
            }
            RetentionStrategy::KeepForHours => {
                let deadline = self.clock.epoch_ms() + opts.retention_hours * 60 * 60 * 1000;
                let sidecar = RetentionSidecar {
                    written_at_ms: self.clock.epoch_ms(),
                    issue_number: opts.issue_number,
                    success: opts.success,
                    scheduled_cleanup_ms: Some(deadline),
                    branch: Some(branch.to_string()),
                };
                if let Err(e) = sidecar.write(worktree_path).await {
                    tracing::warn!(error = %e, "failed to write retention sidecar");
                }
            }
        }
        Ok(())
    }

    /// Remove expired retained worktrees. Returns how many were reaped.
    ///
    /// A worktree is expired when its sidecar's scheduled cleanup has
    /// passed, or when the sidecar itself is older than `max_age_hours`.
    pub async fn sweep_expired(&self, max_age_hours: u64) -> Result<usize, WorkspaceError> {
        let now = self.clock.epoch_ms();
        let max_age_ms = max_age_hours * 60 * 60 * 1000;
        let mut reaped = 0;

        let mut repos = match tokio::fs::read_dir(&self.worktrees_base).await {
            Ok(rd) => rd,
            Err(_) => return Ok(0),
        };
        while let Ok(Some(repo_entry)) = repos.next_entry().await {
            let mut worktrees = match tokio::fs::read_dir(repo_entry.path()).await {
                Ok(rd) => rd,
                Err(_) => continue,
            };
            while let Ok(Some(wt_entry)) = worktrees.next_entry().await {
                let path = wt_entry.path();
                let Some(sidecar) = RetentionSidecar::read(&path).await else {
                    continue;
                };
                let scheduled_passed =
                    sidecar.scheduled_cleanup_ms.is_some_and(|deadline| deadline <= now);
                let too_old = now.saturating_sub(sidecar.written_at_ms) > max_age_ms;
                if scheduled_passed || too_old {
                    self.remove_detached_worktree(&path, sidecar.branch.as_deref()).await;
                    reaped += 1;
                }
            }
        }
        if reaped > 0 {
            tracing::info!(reaped, "retention sweep removed expired worktrees");
        }
        Ok(reaped)
    }

    /// Best-effort worktree removal with the parent repo known.
    async fn remove_worktree(&self, local_repo_path: &Path, worktree_path: &Path) {
        let result = run_with_timeout(
            {
                let mut cmd = git(local_repo_path);
                cmd.args(["worktree", "remove", "--force"]).arg(worktree_path);
                cmd
            },
            GIT_LOCAL_TIMEOUT,
            "git worktree remove",
        )
        .await;
        if let Ok(output) = result {
            if !output.status.success() {
                tracing::debug!(
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "git worktree remove failed, falling back to rm"
                );
            }
        }
        if worktree_path.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(worktree_path).await {
                tracing::warn!(
                    path = %worktree_path.display(),
                    error = %e,
                    "failed to remove worktree directory (best-effort)"
                );
            }
        }
        let _ = run_with_timeout(
            {
                let mut cmd = git(local_repo_path);
                cmd.args(["worktree", "prune"]);
                cmd
            },
            GIT_LOCAL_TIMEOUT,
            "git worktree prune",
        )
        .await;
    }

    /// Worktree removal when only the worktree path is known (sweeper).
    /// The parent repo is located through the worktree's `.git` file.
    async fn remove_detached_worktree(&self, worktree_path: &Path, branch: Option<&str>) {
        let dot_git = worktree_path.join(".git");
        let repo_root = match tokio::fs::read_to_string(&dot_git).await {
            Ok(contents) => contents
                .trim()
                .strip_prefix("gitdir: ")
                .map(PathBuf::from)
                // .git/worktrees/<name> -> repo root (the .git dir itself
                // for a bare clone).
                .and_then(|gitdir| gitdir.parent().and_then(Path::parent).map(Path::to_path_buf)),
            Err(_) => None,
        };

        match &repo_root {
            Some(root) => {
                self.remove_worktree(root, worktree_path).await;
                if let Some(branch) = branch {
                    self.delete_branch(root, branch).await;
                }
            }
            None => {
                if let Err(e) = tokio::fs::remove_dir_all(worktree_path).await {
                    tracing::warn!(
                        path = %worktree_path.display(),
                        error = %e,
                        "failed to remove retained worktree"
                    );
                }
            }
        }
    }

    /// Best-effort local branch deletion.
    async fn delete_branch(&self, local_repo_path: &Path, branch: &str) {
        let result = run_with_timeout(
            {
                let mut cmd = git(local_repo_path);
                cmd.args(["branch", "-D", branch]);
                cmd
            },
            GIT_LOCAL_TIMEOUT,
            "git branch delete",
        )
        .await;
        match result {
            Ok(output) if !output.status.success() => {
                tracing::debug!(
                    branch,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "branch delete skipped"
                );
            }
            Err(e) => tracing::debug!(branch, error = %e, "branch delete failed"),
            _ => {}
        }
    }

    /// Run a network-facing git command with bounded retry on transient
    /// failures.
    async fn with_network_retry<F>(&self, label: &str, mut build: F) -> Result<Output, WorkspaceError>
    where
        F: FnMut() -> tokio::process::Command,
    {
        const ATTEMPTS: u32 = 3;
        let mut last_stderr = String::new();
        for attempt in 1..=ATTEMPTS {
            let output = run_with_timeout(build(), GIT_REMOTE_TIMEOUT, label).await?;
            if output.status.success() {
                return Ok(output);
            }
            last_stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if attempt < ATTEMPTS && is_transient_network_error(&last_stderr) {
                tracing::warn!(attempt, label, stderr = %last_stderr.trim(), "transient git failure, retrying");
                tokio::time::sleep(Duration::from_secs(2)).await;
                continue;
            }
            break;
        }
        Err(WorkspaceError::Git { op: label.to_string(), stderr: last_stderr })
    }
}

/// Inject credentials into an https remote URL for a single invocation.
fn authed_url(repo_url: &str, token: &str) -> String {
    if token.is_empty() {
        return repo_url.to_string();
    }
    match repo_url.strip_prefix("https://") {
        Some(rest) => format!("https://x-access-token:{token}@{rest}"),
        None => repo_url.to_string(),
    }
}

fn is_transient_network_error(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    ["could not resolve", "connection", "timed out", "early eof", "rpc failed", "temporar", "503"]
        .iter()
        .any(|needle| lower.contains(needle))
}

fn is_auth_error(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    ["authentication failed", "invalid username or password", "401", "403", "expired"]
        .iter()
        .any(|needle| lower.contains(needle))
}

fn check(output: Output, op: &str) -> Result<Output, WorkspaceError> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(WorkspaceError::Git {
            op: op.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;

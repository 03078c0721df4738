// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution with timeouts.
//!
//! Every git invocation goes through [`run_with_timeout`] so a wedged
//! subprocess can never hold a worker slot indefinitely.

use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Timeout for local git bookkeeping (worktree add/remove, commit, status).
pub const GIT_LOCAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for git operations that touch the network (clone, fetch, push).
pub const GIT_REMOTE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{label} timed out after {timeout:?}")]
    Timeout { label: String, timeout: Duration },
    #[error("{label} failed to spawn: {source}")]
    Spawn {
        label: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run a command to completion, killing it on timeout.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    label: &str,
) -> Result<Output, SubprocessError> {
    cmd.kill_on_drop(true);
    let fut = cmd.output();
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(SubprocessError::Spawn { label: label.to_string(), source }),
        Err(_) => Err(SubprocessError::Timeout { label: label.to_string(), timeout }),
    }
}

/// Build a `git` command rooted at `repo` with a scrubbed environment.
///
/// GIT_DIR/GIT_WORK_TREE from the parent process would redirect the
/// invocation away from the intended repository.
pub fn git(repo: &std::path::Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(repo);
    cmd.env_remove("GIT_DIR").env_remove("GIT_WORK_TREE");
    cmd
}

/// True when stderr points at a transient index/ref lock that a single
/// retry is allowed to absorb.
pub fn is_lock_error(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("index.lock") || lower.contains("could not lock") || lower.contains("unable to create") && lower.contains(".lock")
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure categorization for metrics and user-facing comments.
//!
//! Categorization only affects reporting; it never changes control flow.

use serde::{Deserialize, Serialize};

/// Reporting bucket for a failed job, derived from the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    AuthError,
    NetworkError,
    GitError,
    GithubApiError,
    TimeoutError,
    UnknownError,
}

crate::simple_display! {
    ErrorCategory {
        AuthError => "auth_error",
        NetworkError => "network_error",
        GitError => "git_error",
        GithubApiError => "github_api_error",
        TimeoutError => "timeout_error",
        UnknownError => "unknown_error",
    }
}

/// Substring-match categorization, first match wins.
pub fn categorize_error(message: &str) -> ErrorCategory {
    let lower = message.to_ascii_lowercase();
    const RULES: &[(&[&str], ErrorCategory)] = &[
        (
            &["authentication", "unauthorized", "401", "bad credentials", "token expired"],
            ErrorCategory::AuthError,
        ),
        (
            &["network", "econnrefused", "econnreset", "dns", "connection refused", "socket hang up"],
            ErrorCategory::NetworkError,
        ),
        (&["git ", "git:", "worktree", "merge conflict", "non-fast-forward"], ErrorCategory::GitError),
        (&["github", "api rate limit", "422", "403", "502", "503"], ErrorCategory::GithubApiError),
        (&["timeout", "timed out", "deadline"], ErrorCategory::TimeoutError),
    ];
    for (needles, category) in RULES {
        if needles.iter().any(|n| lower.contains(n)) {
            return *category;
        }
    }
    ErrorCategory::UnknownError
}

#[cfg(test)]
#[path = "category_tests.rs"]
mod tests;

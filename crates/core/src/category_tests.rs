// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    auth        = { "Bad credentials for installation", ErrorCategory::AuthError },
    unauthorized= { "401 Unauthorized", ErrorCategory::AuthError },
    network     = { "connect ECONNREFUSED 10.0.0.1:443", ErrorCategory::NetworkError },
    git         = { "git worktree add failed: branch exists", ErrorCategory::GitError },
    github      = { "GitHub API responded with 422", ErrorCategory::GithubApiError },
    timeout     = { "operation timed out after 300s", ErrorCategory::TimeoutError },
    unknown     = { "something inexplicable", ErrorCategory::UnknownError },
)]
fn categorization(message: &str, expected: ErrorCategory) {
    assert_eq!(categorize_error(message), expected);
}

#[test]
fn first_match_wins() {
    // Contains both auth and timeout markers; auth rule is checked first.
    assert_eq!(
        categorize_error("unauthorized: request timed out"),
        ErrorCategory::AuthError
    );
}

#[test]
fn display_matches_metric_tags() {
    assert_eq!(ErrorCategory::GithubApiError.to_string(), "github_api_error");
    assert_eq!(ErrorCategory::UnknownError.to_string(), "unknown_error");
}

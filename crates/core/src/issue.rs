// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issue coordinates and forge comment types.

use crate::id::CorrelationId;
use serde::{Deserialize, Serialize};

/// Identifies an inbound unit of work. Immutable within a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub repo_owner: String,
    pub repo_name: String,
    pub number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
}

impl IssueRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            repo_owner: owner.into(),
            repo_name: repo.into(),
            number,
            title: None,
            model_name: None,
            correlation_id: None,
        }
    }

    crate::setters! {
        option {
            title: String,
            model_name: String,
            correlation_id: CorrelationId,
        }
    }

    /// `owner/repo` form used in logs and comment bodies.
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.repo_owner, self.repo_name)
    }
}

impl std::fmt::Display for IssueRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.repo_owner, self.repo_name, self.number)
    }
}

/// Comment author as reported by the forge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentAuthor {
    pub login: String,
    /// Forge-reported account type, e.g. "User" or "Bot".
    #[serde(default)]
    pub kind: String,
}

impl CommentAuthor {
    pub fn user(login: impl Into<String>) -> Self {
        Self { login: login.into(), kind: "User".to_string() }
    }

    pub fn bot(login: impl Into<String>) -> Self {
        Self { login: login.into(), kind: "Bot".to_string() }
    }

    /// True when the forge marks the account as a bot or the login carries
    /// the `[bot]` suffix convention.
    pub fn is_bot(&self, configured_bot: Option<&str>) -> bool {
        self.kind.eq_ignore_ascii_case("bot")
            || self.login.ends_with("[bot]")
            || configured_bot.is_some_and(|name| self.login == name)
    }
}

/// An issue or PR comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub body: String,
    pub author: CommentAuthor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Comment {
    pub fn new(id: u64, author: CommentAuthor, body: impl Into<String>) -> Self {
        Self { id, body: body.into(), author, created_at: None }
    }
}

/// Issue snapshot loaded from the forge before agent execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDetails {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub author: CommentAuthor,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl IssueDetails {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Drop comments written by bots. Returns `(kept, removed_count)`.
    pub fn filter_bot_comments(comments: Vec<Comment>, configured_bot: Option<&str>) -> (Vec<Comment>, usize) {
        let before = comments.len();
        let kept: Vec<Comment> =
            comments.into_iter().filter(|c| !c.author.is_bot(configured_bot)).collect();
        let removed = before - kept.len();
        (kept, removed)
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;

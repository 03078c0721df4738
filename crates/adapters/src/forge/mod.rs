// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Forge capability: authenticated operations on the code-hosting platform.

mod github;

pub use github::{GithubForge, GithubForgeConfig};

use crate::retry::{retryable_message, Retryable};
use async_trait::async_trait;
use gitfix_core::{Comment, CommentAuthor};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Issue snapshot as the forge reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeIssue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub author: CommentAuthor,
    pub created_at: String,
    pub updated_at: String,
}

/// An existing pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
    pub head: String,
    pub base: String,
    pub title: String,
    pub draft: bool,
}

/// Parameters for opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
    pub draft: bool,
}

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("forge auth error: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forge api error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl Retryable for ForgeError {
    /// Network errors, 429 and 5xx, plus transient-sounding messages.
    fn is_retryable(&self) -> bool {
        match self {
            ForgeError::Network(_) => true,
            ForgeError::Api { status, message } => {
                matches!(status, 429 | 500 | 502 | 503 | 504) || retryable_message(message)
            }
            ForgeError::Auth(_) | ForgeError::NotFound(_) => false,
        }
    }
}

/// Authenticated operations on the forge.
///
/// Label mutations are idempotent at this seam: adding an existing label or
/// removing an absent one is success. Labels are never read-modified-written
/// locally; the forge is the only source of truth.
#[async_trait]
pub trait ForgeClient: Send + Sync {
    async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<ForgeIssue, ForgeError>;

    /// All comments on an issue or PR, pagination handled internally.
    async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Comment>, ForgeError>;

    async fn add_labels(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<(), ForgeError>;

    async fn remove_label(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        label: &str,
    ) -> Result<(), ForgeError>;

    async fn create_pr(
        &self,
        owner: &str,
        repo: &str,
        pr: NewPullRequest,
    ) -> Result<PullRequest, ForgeError>;

    async fn list_prs_by_head(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
    ) -> Result<Vec<PullRequest>, ForgeError>;

    /// Returns the new comment's id.
    async fn add_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<u64, ForgeError>;

    async fn delete_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: u64,
    ) -> Result<(), ForgeError>;

    /// Mint an installation token for git pushes.
    async fn get_installation_token(&self) -> Result<String, ForgeError>;

    async fn default_branch(&self, owner: &str, repo: &str) -> Result<String, ForgeError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

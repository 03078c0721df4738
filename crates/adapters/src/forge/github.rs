// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GitHub implementation of [`ForgeClient`] over octocrab, authenticated
//! as a GitHub App installation.

use super::{ForgeClient, ForgeError, ForgeIssue, NewPullRequest, PullRequest};
use crate::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use gitfix_core::{Comment, CommentAuthor};
use octocrab::models::{AppId, InstallationId};
use octocrab::Octocrab;
use secrecy::ExposeSecret;
use std::path::Path;

/// Configuration for GitHub App installation auth.
#[derive(Debug, Clone)]
pub struct GithubForgeConfig {
    pub app_id: u64,
    pub private_key_pem: String,
    pub installation_id: u64,
}

impl GithubForgeConfig {
    /// Load the private key from `GH_PRIVATE_KEY_PATH`.
    pub async fn from_key_file(
        app_id: u64,
        key_path: &Path,
        installation_id: u64,
    ) -> Result<Self, ForgeError> {
        let private_key_pem = tokio::fs::read_to_string(key_path)
            .await
            .map_err(|e| ForgeError::Auth(format!("cannot read private key: {e}")))?;
        Ok(Self { app_id, private_key_pem, installation_id })
    }
}

pub struct GithubForge {
    client: Octocrab,
    app_client: Octocrab,
    installation_id: InstallationId,
    retry: RetryPolicy,
}

impl GithubForge {
    pub fn new(config: &GithubForgeConfig) -> Result<Self, ForgeError> {
        let key = jsonwebtoken::EncodingKey::from_rsa_pem(config.private_key_pem.as_bytes())
            .map_err(|e| ForgeError::Auth(format!("invalid app private key: {e}")))?;
        let app_client = Octocrab::builder()
            .app(AppId(config.app_id), key)
            .build()
            .map_err(|e| ForgeError::Auth(format!("cannot build app client: {e}")))?;
        let installation_id = InstallationId(config.installation_id);
        let client = app_client
            .installation(installation_id)
            .map_err(|e| ForgeError::Auth(format!("cannot scope to installation: {e}")))?;
        Ok(Self { client, app_client, installation_id, retry: RetryPolicy::default() })
    }
}

fn map_err(err: octocrab::Error) -> ForgeError {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            if status == 404 {
                ForgeError::NotFound(source.message.clone())
            } else if status == 401 {
                ForgeError::Auth(source.message.clone())
            } else {
                ForgeError::Api { status, message: source.message.clone() }
            }
        }
        other => ForgeError::Network(other.to_string()),
    }
}

fn map_author(author: Option<octocrab::models::Author>) -> CommentAuthor {
    match author {
        Some(a) => CommentAuthor { login: a.login, kind: a.r#type },
        None => CommentAuthor::default(),
    }
}

#[async_trait]
impl ForgeClient for GithubForge {
    async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<ForgeIssue, ForgeError> {
        let issue = with_retry("get_issue", &self.retry, || async {
            self.client.issues(owner, repo).get(number).await.map_err(map_err)
        })
        .await?;

        Ok(ForgeIssue {
            number: issue.number,
            title: issue.title,
            body: issue.body.unwrap_or_default(),
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
            author: CommentAuthor { login: issue.user.login, kind: issue.user.r#type },
            created_at: issue.created_at.to_rfc3339(),
            updated_at: issue.updated_at.to_rfc3339(),
        })
    }

    async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Comment>, ForgeError> {
        let comments = with_retry("list_issue_comments", &self.retry, || async {
            let page = self
                .client
                .issues(owner, repo)
                .list_comments(number)
                .per_page(100)
                .send()
                .await
                .map_err(map_err)?;
            self.client.all_pages(page).await.map_err(map_err)
        })
        .await?;

        Ok(comments
            .into_iter()
            .map(|c| Comment {
                id: c.id.0,
                body: c.body.unwrap_or_default(),
                author: map_author(Some(c.user)),
                created_at: Some(c.created_at.to_rfc3339()),
            })
            .collect())
    }

    async fn add_labels(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<(), ForgeError> {
        let result = with_retry("add_labels", &self.retry, || async {
            self.client
                .issues(owner, repo)
                .add_labels(number, labels)
                .await
                .map(|_| ())
                .map_err(map_err)
        })
        .await;
        match result {
            Ok(()) => Ok(()),
            // Duplicate label application is success.
            Err(ForgeError::Api { status: 422, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn remove_label(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        label: &str,
    ) -> Result<(), ForgeError> {
        let result = with_retry("remove_label", &self.retry, || async {
            self.client
                .issues(owner, repo)
                .remove_label(number, label)
                .await
                .map(|_| ())
                .map_err(map_err)
        })
        .await;
        match result {
            Ok(()) => Ok(()),
            // Removing an absent label is success.
            Err(ForgeError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn create_pr(
        &self,
        owner: &str,
        repo: &str,
        pr: NewPullRequest,
    ) -> Result<PullRequest, ForgeError> {
        let created = with_retry("create_pr", &self.retry, || async {
            self.client
                .pulls(owner, repo)
                .create(&pr.title, &pr.head, &pr.base)
                .body(&pr.body)
                .draft(pr.draft)
                .send()
                .await
                .map_err(map_err)
        })
        .await?;

        Ok(PullRequest {
            number: created.number,
            url: created.html_url.map(|u| u.to_string()).unwrap_or_default(),
            head: created.head.ref_field,
            base: created.base.ref_field,
            title: created.title.unwrap_or_default(),
            draft: created.draft.unwrap_or(false),
        })
    }

    async fn list_prs_by_head(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
    ) -> Result<Vec<PullRequest>, ForgeError> {
        let qualified_head = format!("{owner}:{head}");
        let page = with_retry("list_prs_by_head", &self.retry, || async {
            self.client
                .pulls(owner, repo)
                .list()
                .head(&qualified_head)
                .per_page(20)
                .send()
                .await
                .map_err(map_err)
        })
        .await?;

        Ok(page
            .items
            .into_iter()
            .map(|p| PullRequest {
                number: p.number,
                url: p.html_url.map(|u| u.to_string()).unwrap_or_default(),
                head: p.head.ref_field,
                base: p.base.ref_field,
                title: p.title.unwrap_or_default(),
                draft: p.draft.unwrap_or(false),
            })
            .collect())
    }

    async fn add_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<u64, ForgeError> {
        let comment = with_retry("add_issue_comment", &self.retry, || async {
            self.client
                .issues(owner, repo)
                .create_comment(number, body)
                .await
                .map_err(map_err)
        })
        .await?;
        Ok(comment.id.0)
    }

    async fn delete_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: u64,
    ) -> Result<(), ForgeError> {
        let result = with_retry("delete_issue_comment", &self.retry, || async {
            self.client
                .issues(owner, repo)
                .delete_comment(octocrab::models::CommentId(comment_id))
                .await
                .map_err(map_err)
        })
        .await;
        match result {
            Ok(()) => Ok(()),
            // Comment already gone.
            Err(ForgeError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn get_installation_token(&self) -> Result<String, ForgeError> {
        let (_, token) = self
            .app_client
            .installation_and_token(self.installation_id)
            .await
            .map_err(map_err)?;
        Ok(token.expose_secret().to_string())
    }

    async fn default_branch(&self, owner: &str, repo: &str) -> Result<String, ForgeError> {
        let repository = with_retry("default_branch", &self.retry, || async {
            self.client.repos(owner, repo).get().await.map_err(map_err)
        })
        .await?;
        Ok(repository.default_branch.unwrap_or_else(|| "main".to_string()))
    }
}

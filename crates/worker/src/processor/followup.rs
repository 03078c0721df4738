// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Apply reviewer follow-up comments to a PR the service authored.

use super::drain::drain_agent_events;
use super::{ForgeTokenSource, StepFailure, WorkerContext};
use crate::report;
use crate::task_state::{FailOptions, TaskUpdate};
use gitfix_core::{
    resolve_alias, AgentOutcome, AgentRequest, Clock, Comment, CorrelationId, FollowupPayload,
    IssueRef, JobEnvelope, JobOptions, JobPayload, TaskId, TaskStage,
};
use gitfix_queue::JobResult;
use gitfix_workspace::{CleanupOptions, CommitAuthor, PushOptions, RetentionStrategy, Workspace};
use rand::Rng;
use std::sync::Arc;
use tokio::sync::mpsc;

const NONCE_ALPHABET: [char; 36] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r',
    's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

pub struct PrFollowupJobProcessor<C: Clock> {
    ctx: Arc<WorkerContext<C>>,
}

struct FollowupState {
    task_id: TaskId,
    correlation_id: CorrelationId,
    model: String,
    issue: IssueRef,
    pr_number: u64,
    branch: String,
    workspace: Option<Workspace>,
    ack_comment_id: Option<u64>,
    job_success: bool,
}

impl<C: Clock> PrFollowupJobProcessor<C> {
    pub fn new(ctx: Arc<WorkerContext<C>>) -> Self {
        Self { ctx }
    }

    pub async fn process(&self, job: &JobEnvelope, payload: &FollowupPayload) -> JobResult {
        let model = resolve_alias(
            payload.llm.as_deref().unwrap_or(&self.ctx.config.default_model),
        );
        let issue = IssueRef::new(&payload.repo_owner, &payload.repo_name, payload.pull_request_number)
            .model_name(model.clone());
        let correlation_id = payload.correlation_id.clone().unwrap_or_default();
        let task_id = TaskId::for_issue(&issue, &model);

        tracing::info!(
            task_id = %task_id,
            job_id = %job.job_id,
            pr = payload.pull_request_number,
            comments = payload.comments.len(),
            "processing PR follow-up job"
        );

        if let Err(e) = self
            .ctx
            .tasks
            .create_task_state(task_id.clone(), issue.clone(), correlation_id.clone())
            .await
        {
            return Err(gitfix_queue::JobError::new(format!("task state create failed: {e}")));
        }

        let mut state = FollowupState {
            task_id,
            correlation_id,
            model,
            issue,
            pr_number: payload.pull_request_number,
            branch: payload.branch_name.clone(),
            workspace: None,
            ack_comment_id: None,
            job_success: false,
        };

        let outcome = self.run(job, payload, &mut state).await;

        // The acknowledgment never outlives the job: a surviving ack would
        // make its cited comment ids look processed on the next delivery.
        self.delete_ack(&mut state).await;
        self.cleanup(&state).await;

        match outcome {
            Ok(value) => Ok(value),
            Err(failure) => {
                self.handle_failure(job, &state, &failure).await;
                Err(failure.into_job_error())
            }
        }
    }

    async fn run(
        &self,
        _job: &JobEnvelope,
        payload: &FollowupPayload,
        st: &mut FollowupState,
    ) -> Result<serde_json::Value, StepFailure> {
        let ctx = &self.ctx;
        let owner = payload.repo_owner.clone();
        let repo = payload.repo_name.clone();

        // Drop comments an earlier bot comment already cites.
        let existing = ctx
            .forge
            .list_issue_comments(&owner, &repo, st.pr_number)
            .await
            .map_err(|e| StepFailure::new(TaskStage::Created, format!("github comments: {e}")))?;
        let pending: Vec<Comment> = payload
            .comments
            .iter()
            .filter(|c| {
                !report::is_comment_processed(&existing, c.id, ctx.config.bot_username.as_deref())
            })
            .cloned()
            .collect();
        let dropped = payload.comments.len() - pending.len();
        if dropped > 0 {
            tracing::info!(dropped, kept = pending.len(), "duplicate follow-up comments dropped");
        }
        if pending.is_empty() {
            st.job_success = true;
            ctx.tasks
                .update_task_state(
                    &st.task_id,
                    TaskStage::Completed,
                    TaskUpdate {
                        reason: Some("skipped: already_processed".to_string()),
                        ..Default::default()
                    },
                )
                .await
                .ok();
            return Ok(serde_json::json!({
                "status": "skipped",
                "reason": "already_processed",
                "issueNumber": st.pr_number,
                "repo": format!("{owner}/{repo}"),
                "model": st.model,
                "correlationId": st.correlation_id,
            }));
        }

        // Acknowledge before touching the tree.
        let ack = report::followup_ack(&pending);
        st.ack_comment_id = ctx
            .forge
            .add_issue_comment(&owner, &repo, st.pr_number, &ack)
            .await
            .map(Some)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "could not post follow-up acknowledgment");
                None
            });

        // SETUP: resume the PR branch in a fresh worktree.
        self.transition(st, TaskStage::Setup).await;
        let token = ctx
            .forge
            .get_installation_token()
            .await
            .map_err(|e| StepFailure::new(TaskStage::Setup, format!("authentication: {e}")))?;
        let repo_url = ctx.config.repo_url(&owner, &repo);
        let clone_path = ctx
            .workspaces
            .ensure_clone(&repo_url, &owner, &repo, &token)
            .await
            .map_err(|e| StepFailure::new(TaskStage::Setup, format!("git clone: {e}")))?;
        let dir_name = format!(
            "followup-pr-{}-{}",
            st.pr_number,
            nanoid::nanoid!(3, &NONCE_ALPHABET)
        );
        let workspace = ctx
            .workspaces
            .create_worktree_from_existing_branch(&clone_path, &st.branch, &dir_name, &owner, &repo)
            .await
            .map_err(|e| StepFailure::new(TaskStage::Setup, format!("git worktree: {e}")))?;
        let worktree_path = workspace.worktree_path.clone();
        st.workspace = Some(workspace);

        // CLAUDE_EXECUTION with the comment-batch prompt.
        self.transition(st, TaskStage::ClaudeExecution).await;
        let prompt = report::followup_prompt(&owner, &repo, st.pr_number, &st.branch, &pending);
        let agent = ctx.agents.for_model(&st.model).ok_or_else(|| {
            StepFailure::new(TaskStage::ClaudeExecution, "no coding agent registered".to_string())
        })?;
        let (event_tx, event_rx) = mpsc::channel(256);
        let drain = drain_agent_events(
            ctx.store.clone(),
            st.task_id.clone(),
            st.correlation_id.clone(),
            event_rx,
        );
        let request = AgentRequest::new(worktree_path, st.issue.clone(), token.clone(), st.model.clone())
            .branch_name(st.branch.clone())
            .custom_prompt(prompt);
        let outcome = agent
            .execute(request, event_tx)
            .await
            .map_err(|e| StepFailure::new(TaskStage::ClaudeExecution, format!("agent: {e}")))?;
        let _ = drain.await;

        let run = match outcome {
            AgentOutcome::UsageLimit { reset_at_epoch_secs } => {
                return self.handle_usage_limit(payload, st, reset_at_epoch_secs).await;
            }
            AgentOutcome::Failed { kind, message } => {
                return Err(StepFailure::new(
                    TaskStage::ClaudeExecution,
                    format!("agent execution failed ({kind}): {message}"),
                ));
            }
            AgentOutcome::Ok(run) => run,
        };

        // GIT_OPERATIONS: commit and push only when the tree changed.
        self.transition(st, TaskStage::GitOperations).await;
        let report_data = report::RunReport::from_run(&run, &st.issue, "followup_applied");
        let Some(ws) = st.workspace.clone() else {
            return Err(StepFailure::new(TaskStage::GitOperations, "worktree vanished".to_string()));
        };
        let changed = ctx
            .workspaces
            .has_changes(&ws)
            .await
            .map_err(|e| StepFailure::new(TaskStage::GitOperations, format!("git status: {e}")))?;

        if !changed {
            let comment = report::followup_no_changes(&pending);
            if let Err(e) = ctx.forge.add_issue_comment(&owner, &repo, st.pr_number, &comment).await
            {
                tracing::warn!(error = %e, "could not post no-changes comment");
            }
            st.job_success = true;
            ctx.tasks
                .update_task_state(
                    &st.task_id,
                    TaskStage::Completed,
                    TaskUpdate {
                        reason: Some("followup_no_changes".to_string()),
                        ..Default::default()
                    },
                )
                .await
                .ok();
            return Ok(serde_json::json!({
                "status": "followup_no_changes",
                "issueNumber": st.pr_number,
                "repo": format!("{owner}/{repo}"),
                "model": st.model,
                "costUsd": run.cost_usd,
                "turns": run.turns,
                "executionTimeMs": run.execution_time_ms,
                "correlationId": st.correlation_id,
            }));
        }

        let message = report::followup_commit_message(st.pr_number, &pending);
        let commit_hash = ctx
            .workspaces
            .commit_changes(&ws, &message, &CommitAuthor::claude_code())
            .await
            .map_err(|e| StepFailure::new(TaskStage::GitOperations, format!("git commit: {e}")))?
            .unwrap_or_default();

        let push_opts = PushOptions {
            repo_url,
            auth_token: token,
            refresh: Some(Arc::new(ForgeTokenSource::new(ctx.forge.clone()))),
        };
        ctx.workspaces
            .push_branch(&ws, &st.branch, &push_opts)
            .await
            .map_err(|e| StepFailure::new(TaskStage::GitOperations, format!("git push: {e}")))?;

        // POST_PROCESSING: confirm on the PR.
        self.transition(st, TaskStage::PostProcessing).await;
        let confirmation = report::followup_confirmation(&commit_hash, &pending, &report_data);
        if let Err(e) = ctx
            .forge
            .add_issue_comment(&owner, &repo, st.pr_number, &confirmation)
            .await
        {
            tracing::warn!(error = %e, "could not post follow-up confirmation");
        }

        st.job_success = true;
        ctx.tasks
            .update_task_state(
                &st.task_id,
                TaskStage::Completed,
                TaskUpdate { reason: Some("followup_applied".to_string()), ..Default::default() },
            )
            .await
            .ok();
        Ok(serde_json::json!({
            "status": "followup_applied",
            "issueNumber": st.pr_number,
            "repo": format!("{owner}/{repo}"),
            "model": st.model,
            "commit": commit_hash,
            "costUsd": run.cost_usd,
            "turns": run.turns,
            "executionTimeMs": run.execution_time_ms,
            "correlationId": st.correlation_id,
        }))
    }

    async fn handle_usage_limit(
        &self,
        payload: &FollowupPayload,
        st: &mut FollowupState,
        reset_at_epoch_secs: u64,
    ) -> Result<serde_json::Value, StepFailure> {
        let ctx = &self.ctx;
        let config = &ctx.config;
        let now_ms = ctx.clock.epoch_ms();
        let jitter = rand::rng().random_range(0..=config.requeue_jitter_ms);
        let delay_ms = reset_at_epoch_secs
            .saturating_mul(1000)
            .saturating_sub(now_ms)
            + config.requeue_buffer_ms
            + jitter;

        ctx.queue
            .enqueue(
                JobPayload::ApplyPrFollowup(payload.clone()),
                JobOptions::default().delay_ms(delay_ms),
            )
            .await
            .map_err(|e| StepFailure::new(TaskStage::ClaudeExecution, format!("requeue: {e}")))?;

        let comment = report::usage_limit_comment(reset_at_epoch_secs, delay_ms);
        if let Err(e) = ctx
            .forge
            .add_issue_comment(&payload.repo_owner, &payload.repo_name, st.pr_number, &comment)
            .await
        {
            tracing::warn!(error = %e, "could not post usage-limit comment");
        }

        ctx.tasks
            .mark_task_failed(
                &st.task_id,
                "provider usage limit reached",
                FailOptions {
                    error_category: None,
                    processing_stage: Some(TaskStage::ClaudeExecution.to_string()),
                    requeued: true,
                    delay_ms: Some(delay_ms),
                },
            )
            .await
            .ok();

        Ok(serde_json::json!({
            "status": "requeued_usage_limit",
            "issueNumber": st.pr_number,
            "repo": format!("{}/{}", payload.repo_owner, payload.repo_name),
            "model": st.model,
            "delayMs": delay_ms,
            "correlationId": st.correlation_id,
        }))
    }

    async fn handle_failure(&self, job: &JobEnvelope, st: &FollowupState, failure: &StepFailure) {
        let category = gitfix_core::categorize_error(&failure.message);
        let will_retry = job.attempt < job.options.attempts;
        tracing::error!(
            task_id = %st.task_id,
            stage = %failure.stage,
            category = %category,
            error = %failure.message,
            "follow-up job failed"
        );
        let comment =
            report::failure_comment(category, &failure.message, &failure.message, will_retry);
        if let Err(e) = self
            .ctx
            .forge
            .add_issue_comment(&st.issue.repo_owner, &st.issue.repo_name, st.pr_number, &comment)
            .await
        {
            tracing::warn!(error = %e, "could not post failure comment");
        }
        self.ctx
            .tasks
            .mark_task_failed(
                &st.task_id,
                &failure.message,
                FailOptions {
                    error_category: Some(category.to_string()),
                    processing_stage: Some(failure.stage.to_string()),
                    requeued: false,
                    delay_ms: None,
                },
            )
            .await
            .ok();
    }

    async fn delete_ack(&self, st: &mut FollowupState) {
        if let Some(ack_id) = st.ack_comment_id.take() {
            if let Err(e) = self
                .ctx
                .forge
                .delete_issue_comment(&st.issue.repo_owner, &st.issue.repo_name, ack_id)
                .await
            {
                tracing::warn!(error = %e, "could not delete acknowledgment comment");
            }
        }
    }

    /// The branch belongs to the PR: never delete it.
    async fn cleanup(&self, st: &FollowupState) {
        let Some(ws) = &st.workspace else { return };
        // Follow-up worktrees are disposable regardless of the configured
        // retention strategy for issue runs; only failures honor it.
        let strategy = if st.job_success {
            RetentionStrategy::AlwaysDelete
        } else {
            self.ctx.config.retention_strategy
        };
        let opts = CleanupOptions {
            delete_branch: false,
            success: st.job_success,
            strategy,
            retention_hours: self.ctx.config.retention_hours,
            issue_number: st.pr_number,
        };
        if let Err(e) = self
            .ctx
            .workspaces
            .cleanup_worktree(&ws.local_repo_path, &ws.worktree_path, &ws.branch_name, &opts)
            .await
        {
            tracing::warn!(error = %e, "worktree cleanup failed");
        }
    }

    async fn transition(&self, st: &FollowupState, stage: TaskStage) {
        if let Err(e) = self
            .ctx
            .tasks
            .update_task_state(&st.task_id, stage, TaskUpdate::default())
            .await
        {
            tracing::warn!(error = %e, "task state update failed");
        }
    }
}

#[cfg(test)]
#[path = "followup_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The implement-issue state machine.
//!
//! CREATED → SETUP → PROCESSING → CLAUDE_EXECUTION → GIT_OPERATIONS →
//! POST_PROCESSING → COMPLETED | FAILED, with a final validation pass that
//! guarantees a successful run with a pushed branch ends up with a PR.

use super::drain::drain_agent_events;
use super::{ForgeTokenSource, StepFailure, WorkerContext};
use crate::report;
use crate::task_state::{FailOptions, TaskUpdate};
use gitfix_adapters::{NewPullRequest, PullRequest};
use gitfix_core::{
    categorize_error, resolve_alias, stagger_delay_ms, AgentOutcome, AgentRequest, AgentRun,
    Clock, CorrelationId, IssueDetails, IssuePayload, IssueRef, JobEnvelope, JobOptions,
    JobPayload, TaskId, TaskMetadata, TaskStage,
};
use gitfix_queue::JobResult;
use gitfix_workspace::{CleanupOptions, CommitAuthor, PushOptions, Workspace};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct IssueJobProcessor<C: Clock> {
    ctx: Arc<WorkerContext<C>>,
}

/// Mutable state threaded through the pipeline so the outer wrapper can
/// clean up and report regardless of where a step failed.
struct RunState {
    task_id: TaskId,
    correlation_id: CorrelationId,
    model: String,
    issue: IssueRef,
    title: String,
    workspace: Option<Workspace>,
    branch_pushed: bool,
    agent_run: Option<AgentRun>,
    commit_hash: Option<String>,
    pr: Option<PullRequest>,
    pr_created_directly: bool,
    job_success: bool,
}

impl RunState {
    fn result_value(&self, status: &str) -> serde_json::Value {
        let run = self.agent_run.as_ref();
        serde_json::json!({
            "status": status,
            "issueNumber": self.issue.number,
            "repo": self.issue.repo_slug(),
            "model": self.model,
            "costUsd": run.map(|r| r.cost_usd).unwrap_or(0.0),
            "turns": run.map(|r| r.turns).unwrap_or(0),
            "executionTimeMs": run.map(|r| r.execution_time_ms).unwrap_or(0),
            "correlationId": self.correlation_id,
            "pullRequestUrl": self.pr.as_ref().map(|pr| pr.url.clone()),
        })
    }
}

impl<C: Clock> IssueJobProcessor<C> {
    pub fn new(ctx: Arc<WorkerContext<C>>) -> Self {
        Self { ctx }
    }

    pub async fn process(&self, job: &JobEnvelope, payload: &IssuePayload) -> JobResult {
        let config = &self.ctx.config;
        let issue = payload.issue.clone();
        let model = resolve_alias(
            issue.model_name.as_deref().unwrap_or(&config.default_model),
        );
        let correlation_id = issue
            .correlation_id
            .clone()
            .unwrap_or_default();
        let task_id = TaskId::for_issue(&issue, &model);

        tracing::info!(
            task_id = %task_id,
            job_id = %job.job_id,
            model = %model,
            correlation_id = %correlation_id,
            "processing issue job"
        );

        if let Err(e) = self
            .ctx
            .tasks
            .create_task_state(task_id.clone(), issue.clone(), correlation_id.clone())
            .await
        {
            return Err(gitfix_queue::JobError::new(format!("task state create failed: {e}")));
        }

        let mut state = RunState {
            task_id,
            correlation_id,
            model,
            title: issue.title.clone().unwrap_or_default(),
            issue,
            workspace: None,
            branch_pushed: false,
            agent_run: None,
            commit_hash: None,
            pr: None,
            pr_created_directly: false,
            job_success: false,
        };

        let outcome = self.run(job, payload, &mut state).await;
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
        job: &JobEnvelope,
        payload: &IssuePayload,
        st: &mut RunState,
    ) -> Result<serde_json::Value, StepFailure> {
        let ctx = &self.ctx;
        let config = &ctx.config;
        let owner = st.issue.repo_owner.clone();
        let repo = st.issue.repo_name.clone();
        let number = st.issue.number;

        // De-phase concurrent jobs for the same issue under different
        // models before any filesystem or API burst.
        tokio::time::sleep(Duration::from_millis(stagger_delay_ms(&st.model))).await;

        // Label preconditions gate everything else.
        let forge_issue = ctx
            .forge
            .get_issue(&owner, &repo, number)
            .await
            .map_err(|e| StepFailure::new(TaskStage::Created, format!("github get_issue: {e}")))?;
        st.title = forge_issue.title.clone();
        st.issue.title = Some(forge_issue.title.clone());

        if !forge_issue.labels.iter().any(|l| l == &config.primary_tag) {
            return self
                .skip(st, format!("label `{}` not present", config.primary_tag))
                .await;
        }
        if forge_issue.labels.iter().any(|l| l == &config.done_tag) {
            return self.skip(st, format!("label `{}` already set", config.done_tag)).await;
        }

        ctx.forge
            .add_labels(&owner, &repo, number, &[config.processing_tag.clone()])
            .await
            .map_err(|e| StepFailure::new(TaskStage::Created, format!("github add_labels: {e}")))?;

        // SETUP: clone, worktree, deterministic remote branch.
        self.transition(st, TaskStage::Setup, None).await;
        let token = ctx
            .forge
            .get_installation_token()
            .await
            .map_err(|e| StepFailure::new(TaskStage::Setup, format!("authentication: {e}")))?;
        let repo_url = config.repo_url(&owner, &repo);
        let clone_path = ctx
            .workspaces
            .ensure_clone(&repo_url, &owner, &repo, &token)
            .await
            .map_err(|e| StepFailure::new(TaskStage::Setup, format!("git clone: {e}")))?;

        let base_branch = match &payload.base_branch {
            Some(base) => base.clone(),
            None => ctx
                .forge
                .default_branch(&owner, &repo)
                .await
                .unwrap_or_else(|_| config.default_branch.clone()),
        };
        let workspace = ctx
            .workspaces
            .create_worktree_for_issue(
                &clone_path,
                number,
                &st.title,
                &owner,
                &repo,
                Some(base_branch.clone()),
                Some(st.model.clone()),
            )
            .await
            .map_err(|e| StepFailure::new(TaskStage::Setup, format!("git worktree: {e}")))?;

        let worktree_name = workspace
            .worktree_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let branch = workspace.branch_name.clone();
        st.workspace = Some(workspace);

        self.update_metadata(st, |meta| meta.model = Some(st.model.clone())).await;

        let started_comment = report::processing_started(&st.model, &branch, &base_branch, &worktree_name);
        if let Err(e) = ctx.forge.add_issue_comment(&owner, &repo, number, &started_comment).await
        {
            tracing::warn!(error = %e, "could not post processing-started comment");
        }

        // Deterministic remote presence: the branch exists upstream before
        // the agent runs.
        let push_opts = PushOptions {
            repo_url: repo_url.clone(),
            auth_token: token.clone(),
            refresh: Some(Arc::new(ForgeTokenSource::new(ctx.forge.clone()))),
        };
        if let Some(ws) = &st.workspace {
            ctx.workspaces
                .push_branch(ws, &branch, &push_opts)
                .await
                .map_err(|e| StepFailure::new(TaskStage::Setup, format!("git push: {e}")))?;
            st.branch_pushed = true;
        }

        // PROCESSING: assemble agent context with bot chatter removed.
        self.transition(st, TaskStage::Processing, None).await;
        let comments = ctx
            .forge
            .list_issue_comments(&owner, &repo, number)
            .await
            .map_err(|e| StepFailure::new(TaskStage::Processing, format!("github comments: {e}")))?;
        let total = comments.len();
        let (kept, removed) =
            IssueDetails::filter_bot_comments(comments, config.bot_username.as_deref());
        tracing::info!(total, kept = kept.len(), removed, "issue comments filtered");

        let details = IssueDetails {
            title: forge_issue.title.clone(),
            body: forge_issue.body.clone(),
            labels: forge_issue.labels.clone(),
            author: forge_issue.author.clone(),
            comments: kept,
        };

        // CLAUDE_EXECUTION.
        self.transition(st, TaskStage::ClaudeExecution, None).await;
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

        let worktree_path = st
            .workspace
            .as_ref()
            .map(|ws| ws.worktree_path.clone())
            .unwrap_or_default();
        let request = AgentRequest::new(worktree_path, st.issue.clone(), token.clone(), st.model.clone())
            .branch_name(branch.clone())
            .issue_details(details);

        let outcome = agent
            .execute(request, event_tx)
            .await
            .map_err(|e| StepFailure::new(TaskStage::ClaudeExecution, format!("agent: {e}")))?;
        let drained = drain.await.unwrap_or_default();

        self.update_metadata(st, |meta| {
            meta.session_id = drained.session_id.clone();
            meta.container_id = drained.container_id.clone();
            meta.container_name = drained.container_name.clone();
        })
        .await;

        let run = match outcome {
            AgentOutcome::UsageLimit { reset_at_epoch_secs } => {
                return self.handle_usage_limit(job, payload, st, reset_at_epoch_secs).await;
            }
            AgentOutcome::Failed { kind, message } => {
                return Err(StepFailure::new(
                    TaskStage::ClaudeExecution,
                    format!("agent execution failed ({kind}): {message}"),
                ));
            }
            AgentOutcome::Ok(run) => run,
        };
        tracing::info!(
            success = run.success,
            turns = run.turns,
            cost_usd = run.cost_usd,
            execution_ms = run.execution_time_ms,
            "agent run finished"
        );
        st.agent_run = Some(run);

        // GIT_OPERATIONS: commit whatever the run left behind.
        self.transition(st, TaskStage::GitOperations, None).await;
        let run_success = st.agent_run.as_ref().map(|r| r.success).unwrap_or(false);
        let commit_message = st
            .agent_run
            .as_ref()
            .and_then(|r| r.suggested_commit_message.clone())
            .unwrap_or_else(|| {
                report::default_commit_message(number, &st.title, &st.model, run_success)
            });

        if let Some(ws) = &st.workspace {
            // Publish the diff snapshot before committing.
            if let Ok(diff) = ctx.workspaces.capture_diff(ws).await {
                if !diff.is_empty() {
                    let _ = ctx
                        .store
                        .publish(
                            &gitfix_core::keys::task_diff_channel(&st.task_id),
                            diff.unified.clone().into_bytes(),
                        )
                        .await;
                }
            }
            st.commit_hash = ctx
                .workspaces
                .commit_changes(ws, &commit_message, &CommitAuthor::claude_code())
                .await
                .map_err(|e| StepFailure::new(TaskStage::GitOperations, format!("git commit: {e}")))?;

            if st.commit_hash.is_some() {
                ctx.workspaces
                    .push_branch(ws, &branch, &push_opts)
                    .await
                    .map_err(|e| StepFailure::new(TaskStage::GitOperations, format!("git push: {e}")))?;
            }
        }

        if st.commit_hash.is_none() {
            if run_success {
                // Agent is confident nothing needs to change.
                return self.finish_no_changes(st, &owner, &repo, number).await;
            }
            return Err(StepFailure::new(
                TaskStage::PostProcessing,
                "claude_processing_failed: agent did not complete and left no changes".to_string(),
            ));
        }

        // POST_PROCESSING: produce the PR deterministically.
        self.transition(st, TaskStage::PostProcessing, None).await;
        let status_tag = if run_success { "success" } else { "claude_processing_failed" };
        let run_report = st
            .agent_run
            .as_ref()
            .map(|r| report::RunReport::from_run(r, &st.issue, status_tag))
            .unwrap_or_default();
        let body = report::pr_body(
            number,
            &st.model,
            &branch,
            st.commit_hash.as_deref(),
            &run_report,
        );
        let new_pr = NewPullRequest {
            title: report::pr_title(number, &st.title),
            head: branch.clone(),
            base: base_branch.clone(),
            body,
            draft: false,
        };

        match ctx.forge.create_pr(&owner, &repo, new_pr).await {
            Ok(pr) => {
                tracing::info!(pr = pr.number, url = %pr.url, "pull request created");
                st.pr = Some(pr);
                st.pr_created_directly = true;
            }
            Err(e) => {
                tracing::warn!(error = %e, "create_pr failed, checking for an existing PR");
                st.pr = self.find_existing_pr(&owner, &repo, &branch).await;
            }
        }

        // FINAL VALIDATION: a successful run with a pushed branch must end
        // with a PR; run the emergency PR-only retry if it does not.
        if st.pr.is_none() && run_success && st.branch_pushed {
            st.pr = self
                .emergency_pr_retry(st, &agent, &token, &branch, &base_branch)
                .await;
        }

        let Some(pr) = st.pr.clone() else {
            // Still no PR. Post the completion report so the run is not
            // silent, then fail the job.
            let comment = report::completion_report(&run_report);
            if let Err(e) = ctx.forge.add_issue_comment(&owner, &repo, number, &comment).await {
                tracing::warn!(error = %e, "could not post completion comment");
            }
            return Err(StepFailure::new(
                TaskStage::PostProcessing,
                if run_success {
                    "github api error: no pull request detected after emergency retry".to_string()
                } else {
                    "claude_processing_failed: no pull request produced".to_string()
                },
            ));
        };

        // Label the PR and flip the issue labels.
        if let Err(e) = ctx
            .forge
            .add_labels(&owner, &repo, pr.number, &[config.pr_label.clone()])
            .await
        {
            tracing::warn!(error = %e, "could not label the PR");
        }
        ctx.forge
            .remove_label(&owner, &repo, number, &config.processing_tag)
            .await
            .map_err(|e| StepFailure::new(TaskStage::PostProcessing, format!("github labels: {e}")))?;
        ctx.forge
            .add_labels(&owner, &repo, number, &[config.done_tag.clone()])
            .await
            .map_err(|e| StepFailure::new(TaskStage::PostProcessing, format!("github labels: {e}")))?;

        // Adopted PRs did not get the report as their body; surface it on
        // the issue instead.
        if !st.pr_created_directly {
            let comment = report::completion_report(&run_report);
            if let Err(e) = ctx.forge.add_issue_comment(&owner, &repo, number, &comment).await {
                tracing::warn!(error = %e, "could not post completion comment");
            }
        }

        st.job_success = true;
        self.ctx
            .tasks
            .update_task_state(
                &st.task_id,
                TaskStage::Completed,
                TaskUpdate {
                    reason: Some(status_tag.to_string()),
                    pull_request_url: Some(pr.url.clone()),
                    ..Default::default()
                },
            )
            .await
            .ok();
        Ok(st.result_value("success"))
    }

    /// Precondition skip: no work, no retry.
    async fn skip(&self, st: &mut RunState, reason: String) -> Result<serde_json::Value, StepFailure> {
        tracing::info!(task_id = %st.task_id, %reason, "skipping issue");
        st.job_success = true;
        self.ctx
            .tasks
            .update_task_state(
                &st.task_id,
                TaskStage::Completed,
                TaskUpdate { reason: Some(format!("skipped: {reason}")), ..Default::default() },
            )
            .await
            .ok();
        Ok(serde_json::json!({
            "status": "skipped",
            "reason": reason,
            "issueNumber": st.issue.number,
            "repo": st.issue.repo_slug(),
            "model": st.model,
            "correlationId": st.correlation_id,
        }))
    }

    /// E2E-2: clean run, clean tree. Report and finish.
    async fn finish_no_changes(
        &self,
        st: &mut RunState,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<serde_json::Value, StepFailure> {
        let config = &self.ctx.config;
        let run_report = st
            .agent_run
            .as_ref()
            .map(|r| report::RunReport::from_run(r, &st.issue, "claude_success_no_changes"))
            .unwrap_or_default();
        let comment = report::no_changes_comment(&run_report);
        if let Err(e) = self.ctx.forge.add_issue_comment(owner, repo, number, &comment).await {
            tracing::warn!(error = %e, "could not post no-changes comment");
        }
        self.ctx
            .forge
            .remove_label(owner, repo, number, &config.processing_tag)
            .await
            .map_err(|e| StepFailure::new(TaskStage::PostProcessing, format!("github labels: {e}")))?;
        self.ctx
            .forge
            .add_labels(owner, repo, number, &[config.done_tag.clone()])
            .await
            .map_err(|e| StepFailure::new(TaskStage::PostProcessing, format!("github labels: {e}")))?;

        st.job_success = true;
        self.ctx
            .tasks
            .update_task_state(
                &st.task_id,
                TaskStage::Completed,
                TaskUpdate {
                    reason: Some("claude_success_no_changes".to_string()),
                    ..Default::default()
                },
            )
            .await
            .ok();
        Ok(st.result_value("claude_success_no_changes"))
    }

    /// USAGE_LIMIT is not a failure: re-enqueue past the reset with buffer
    /// and jitter, tell the issue, and return a handled status. The
    /// current attempt is not counted.
    async fn handle_usage_limit(
        &self,
        _job: &JobEnvelope,
        payload: &IssuePayload,
        st: &mut RunState,
        reset_at_epoch_secs: u64,
    ) -> Result<serde_json::Value, StepFailure> {
        let ctx = &self.ctx;
        let config = &ctx.config;
        let now_ms = ctx.clock.epoch_ms();
        let reset_ms = reset_at_epoch_secs.saturating_mul(1000);
        let jitter = rand::rng().random_range(0..=config.requeue_jitter_ms);
        let delay_ms = reset_ms.saturating_sub(now_ms) + config.requeue_buffer_ms + jitter;

        let options = JobOptions::default().delay_ms(delay_ms);
        let fresh_payload = JobPayload::ImplementIssue(payload.clone());
        let new_job = ctx
            .queue
            .enqueue(fresh_payload, options)
            .await
            .map_err(|e| StepFailure::new(TaskStage::ClaudeExecution, format!("requeue: {e}")))?;
        tracing::info!(
            task_id = %st.task_id,
            new_job_id = %new_job,
            delay_ms,
            "usage limit hit; job re-enqueued past the reset"
        );

        let comment = report::usage_limit_comment(reset_at_epoch_secs, delay_ms);
        if let Err(e) = ctx
            .forge
            .add_issue_comment(&st.issue.repo_owner, &st.issue.repo_name, st.issue.number, &comment)
            .await
        {
            tracing::warn!(error = %e, "could not post usage-limit comment");
        }
        if let Err(e) = ctx
            .forge
            .remove_label(
                &st.issue.repo_owner,
                &st.issue.repo_name,
                st.issue.number,
                &config.processing_tag,
            )
            .await
        {
            tracing::warn!(error = %e, "could not remove processing label");
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

        ctx.metrics
            .record_activity(
                "usage_limit_requeue",
                &format!("{} requeued for {delay_ms} ms", st.issue),
                Some(st.correlation_id.clone()),
            )
            .await;

        Ok(serde_json::json!({
            "status": "requeued_usage_limit",
            "issueNumber": st.issue.number,
            "repo": st.issue.repo_slug(),
            "model": st.model,
            "delayMs": delay_ms,
            "correlationId": st.correlation_id,
        }))
    }

    async fn find_existing_pr(&self, owner: &str, repo: &str, branch: &str) -> Option<PullRequest> {
        match self.ctx.forge.list_prs_by_head(owner, repo, branch).await {
            Ok(prs) => {
                let adopted = prs.into_iter().next();
                if let Some(pr) = &adopted {
                    tracing::info!(pr = pr.number, "adopted existing PR for head branch");
                }
                adopted
            }
            Err(e) => {
                tracing::warn!(error = %e, "list_prs_by_head failed");
                None
            }
        }
    }

    /// Emergency retry: run the agent once more with a PR-creation-only
    /// prompt, then revalidate from scratch (no expected PR number, so a
    /// stale pre-retry observation cannot satisfy the check).
    async fn emergency_pr_retry(
        &self,
        st: &RunState,
        agent: &Arc<dyn gitfix_adapters::CodingAgent>,
        token: &str,
        branch: &str,
        base_branch: &str,
    ) -> Option<PullRequest> {
        tracing::warn!(
            task_id = %st.task_id,
            "successful run with pushed branch but no PR; running PR-only retry"
        );
        let prompt = report::pr_only_prompt(
            &st.issue.repo_owner,
            &st.issue.repo_name,
            st.issue.number,
            branch,
            base_branch,
        );
        let worktree_path = st
            .workspace
            .as_ref()
            .map(|ws| ws.worktree_path.clone())
            .unwrap_or_default();
        let request =
            AgentRequest::new(worktree_path, st.issue.clone(), token.to_string(), st.model.clone())
                .branch_name(branch.to_string())
                .custom_prompt(prompt)
                .is_retry(true)
                .retry_reason("missing pull request after successful implementation");

        let (event_tx, event_rx) = mpsc::channel(64);
        let drain = drain_agent_events(
            self.ctx.store.clone(),
            st.task_id.clone(),
            st.correlation_id.clone(),
            event_rx,
        );
        if let Err(e) = agent.execute(request, event_tx).await {
            tracing::warn!(error = %e, "emergency PR retry execution failed");
        }
        let _ = drain.await;

        self.find_existing_pr(&st.issue.repo_owner, &st.issue.repo_name, branch).await
    }

    /// Failure bookkeeping: categorize, tell the issue, mark the task.
    async fn handle_failure(&self, job: &JobEnvelope, st: &RunState, failure: &StepFailure) {
        let category = categorize_error(&failure.message);
        let will_retry = job.attempt < job.options.attempts;
        tracing::error!(
            task_id = %st.task_id,
            stage = %failure.stage,
            category = %category,
            will_retry,
            error = %failure.message,
            "issue job failed"
        );

        let comment =
            report::failure_comment(category, &failure.message, &failure.message, will_retry);
        if let Err(e) = self
            .ctx
            .forge
            .add_issue_comment(&st.issue.repo_owner, &st.issue.repo_name, st.issue.number, &comment)
            .await
        {
            tracing::warn!(error = %e, "could not post failure comment");
        }

        // The processing label never survives a terminal failure.
        if !will_retry {
            if let Err(e) = self
                .ctx
                .forge
                .remove_label(
                    &st.issue.repo_owner,
                    &st.issue.repo_name,
                    st.issue.number,
                    &self.ctx.config.processing_tag,
                )
                .await
            {
                tracing::warn!(error = %e, "could not remove processing label");
            }
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

    /// Retention-policy cleanup, exercised on every exit path.
    async fn cleanup(&self, st: &RunState) {
        let Some(ws) = &st.workspace else { return };
        let opts = CleanupOptions {
            delete_branch: true,
            success: st.job_success,
            strategy: self.ctx.config.retention_strategy,
            retention_hours: self.ctx.config.retention_hours,
            issue_number: st.issue.number,
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

    async fn transition(&self, st: &RunState, stage: TaskStage, reason: Option<String>) {
        if let Err(e) = self
            .ctx
            .tasks
            .update_task_state(
                &st.task_id,
                stage,
                TaskUpdate { reason, ..Default::default() },
            )
            .await
        {
            tracing::warn!(error = %e, "task state update failed");
        }
    }

    async fn update_metadata(&self, st: &RunState, apply: impl FnOnce(&mut TaskMetadata)) {
        let mut metadata = TaskMetadata::default();
        apply(&mut metadata);
        if let Err(e) = self.ctx.tasks.merge_metadata(&st.task_id, metadata).await {
            tracing::warn!(error = %e, "task metadata update failed");
        }
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;

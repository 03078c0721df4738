// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Import externally-tracked work into task state. No forge or agent
//! interaction; the dashboard just gets a record to show.

use super::WorkerContext;
use crate::task_state::TaskUpdate;
use gitfix_core::{resolve_alias, Clock, ImportPayload, JobEnvelope, TaskId, TaskStage};
use gitfix_queue::{JobError, JobResult};
use std::sync::Arc;

pub struct ImportTaskProcessor<C: Clock> {
    ctx: Arc<WorkerContext<C>>,
}

impl<C: Clock> ImportTaskProcessor<C> {
    pub fn new(ctx: Arc<WorkerContext<C>>) -> Self {
        Self { ctx }
    }

    pub async fn process(&self, job: &JobEnvelope, payload: &ImportPayload) -> JobResult {
        let issue = payload.issue.clone();
        let model = resolve_alias(
            issue.model_name.as_deref().unwrap_or(&self.ctx.config.default_model),
        );
        let correlation_id = issue.correlation_id.clone().unwrap_or_default();
        let task_id = TaskId::for_issue(&issue, &model);

        tracing::info!(task_id = %task_id, job_id = %job.job_id, "importing task");

        self.ctx
            .tasks
            .create_task_state(task_id.clone(), issue.clone(), correlation_id.clone())
            .await
            .map_err(|e| JobError::new(format!("task state create failed: {e}")))?;
        self.ctx
            .tasks
            .update_task_state(
                &task_id,
                TaskStage::Created,
                TaskUpdate {
                    reason: Some(
                        payload.note.clone().unwrap_or_else(|| "imported".to_string()),
                    ),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| JobError::new(format!("task state update failed: {e}")))?;

        self.ctx
            .metrics
            .record_activity(
                "task_imported",
                &format!("{} imported", issue),
                Some(correlation_id.clone()),
            )
            .await;

        Ok(serde_json::json!({
            "status": "imported",
            "issueNumber": issue.number,
            "repo": issue.repo_slug(),
            "model": model,
            "correlationId": correlation_id,
        }))
    }
}

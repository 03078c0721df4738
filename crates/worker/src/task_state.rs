// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task state persistence and live-channel publication.

use gitfix_core::{keys, Clock, CorrelationId, IssueRef, TaskId, TaskMetadata, TaskStage, TaskState};
use gitfix_store::{KvStore, StoreError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Terminal records are kept this long.
const TERMINAL_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Non-terminal records refresh this TTL on every update.
const ACTIVE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum TaskStateError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("task state already exists: {0}")]
    AlreadyExists(TaskId),
    #[error("task state not found: {0}")]
    NotFound(TaskId),
    #[error("corrupt task state for {0}: {1}")]
    Corrupt(TaskId, String),
}

/// Fields applied by [`TaskStateManager::update_task_state`].
#[derive(Debug, Default, Clone)]
pub struct TaskUpdate {
    pub reason: Option<String>,
    /// Subsystem metadata merged over the record's current metadata.
    pub metadata: TaskMetadata,
    /// Extra keys merged into the new history entry.
    pub history_metadata: BTreeMap<String, serde_json::Value>,
    pub pull_request_url: Option<String>,
}

/// Fields applied by [`TaskStateManager::mark_task_failed`].
#[derive(Debug, Default, Clone)]
pub struct FailOptions {
    pub error_category: Option<String>,
    pub processing_stage: Option<String>,
    /// True when the job was re-enqueued rather than terminally failed
    /// (the usage-limit path).
    pub requeued: bool,
    pub delay_ms: Option<u64>,
}

/// Per-task record manager. The dashboard reads what this writes.
pub struct TaskStateManager<C: Clock> {
    store: Arc<dyn KvStore>,
    clock: C,
    strict_create: bool,
}

impl<C: Clock> Clone for TaskStateManager<C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
            strict_create: self.strict_create,
        }
    }
}

impl<C: Clock> TaskStateManager<C> {
    pub fn new(store: Arc<dyn KvStore>, clock: C) -> Self {
        Self { store, clock, strict_create: false }
    }

    /// Fail `create_task_state` when a record already exists
    /// (default is upsert).
    pub fn with_strict_create(mut self) -> Self {
        self.strict_create = true;
        self
    }

    pub async fn get(&self, task_id: &TaskId) -> Result<Option<TaskState>, TaskStateError> {
        let Some(raw) = self.store.get(&keys::task_state(task_id)).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| TaskStateError::Corrupt(task_id.clone(), e.to_string()))
    }

    /// Create (or, by default, replace) the record for a task.
    pub async fn create_task_state(
        &self,
        task_id: TaskId,
        issue: IssueRef,
        correlation_id: CorrelationId,
    ) -> Result<TaskState, TaskStateError> {
        if self.strict_create && self.get(&task_id).await?.is_some() {
            return Err(TaskStateError::AlreadyExists(task_id));
        }
        let state = TaskState::new(task_id, issue, correlation_id, self.clock.epoch_ms());
        self.save(&state).await?;
        self.publish(&state, None).await;
        Ok(state)
    }

    /// Append a history entry, merge metadata, and publish the transition.
    pub async fn update_task_state(
        &self,
        task_id: &TaskId,
        stage: TaskStage,
        update: TaskUpdate,
    ) -> Result<TaskState, TaskStateError> {
        let mut state = self
            .get(task_id)
            .await?
            .ok_or_else(|| TaskStateError::NotFound(task_id.clone()))?;
        let now = self.clock.epoch_ms();
        state.transition(stage, update.reason.clone(), now);
        state.metadata.merge(&update.metadata);
        if let Some(url) = update.pull_request_url {
            state.metadata.pull_request_url = Some(url);
        }
        if !update.history_metadata.is_empty() {
            state.merge_history_metadata(stage, update.history_metadata, now);
        }
        self.save(&state).await?;
        self.publish(&state, update.reason.as_deref()).await;
        Ok(state)
    }

    /// Merge subsystem metadata without touching stage or history.
    pub async fn merge_metadata(
        &self,
        task_id: &TaskId,
        metadata: TaskMetadata,
    ) -> Result<(), TaskStateError> {
        let mut state = self
            .get(task_id)
            .await?
            .ok_or_else(|| TaskStateError::NotFound(task_id.clone()))?;
        state.metadata.merge(&metadata);
        state.updated_at_ms = self.clock.epoch_ms();
        self.save(&state).await?;
        Ok(())
    }

    /// Merge metadata into an earlier history entry without changing stage.
    pub async fn update_history_metadata(
        &self,
        task_id: &TaskId,
        stage: TaskStage,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> Result<(), TaskStateError> {
        let mut state = self
            .get(task_id)
            .await?
            .ok_or_else(|| TaskStateError::NotFound(task_id.clone()))?;
        state.merge_history_metadata(stage, metadata, self.clock.epoch_ms());
        self.save(&state).await?;
        Ok(())
    }

    /// Move the task to FAILED with categorization detail.
    pub async fn mark_task_failed(
        &self,
        task_id: &TaskId,
        error: &str,
        opts: FailOptions,
    ) -> Result<TaskState, TaskStateError> {
        let mut history_metadata = BTreeMap::new();
        if let Some(stage) = &opts.processing_stage {
            history_metadata
                .insert("processing_stage".to_string(), serde_json::json!(stage));
        }
        if opts.requeued {
            history_metadata.insert("requeued".to_string(), serde_json::json!(true));
            if let Some(delay) = opts.delay_ms {
                history_metadata.insert("delay_ms".to_string(), serde_json::json!(delay));
            }
        }
        let metadata = TaskMetadata {
            error_category: opts.error_category.clone(),
            ..Default::default()
        };
        self.update_task_state(
            task_id,
            TaskStage::Failed,
            TaskUpdate {
                reason: Some(error.to_string()),
                metadata,
                history_metadata,
                pull_request_url: None,
            },
        )
        .await
    }

    async fn save(&self, state: &TaskState) -> Result<(), TaskStateError> {
        let ttl = if state.is_terminal() { TERMINAL_TTL } else { ACTIVE_TTL };
        let raw = serde_json::to_vec(state)
            .map_err(|e| TaskStateError::Corrupt(state.task_id.clone(), e.to_string()))?;
        self.store.set(&keys::task_state(&state.task_id), raw, Some(ttl)).await?;
        Ok(())
    }

    /// Publish the transition on both live channels: the compact status
    /// event and the full record.
    async fn publish(&self, state: &TaskState, reason: Option<&str>) {
        let status = serde_json::json!({
            "taskId": state.task_id,
            "stage": state.stage,
            "reason": reason,
            "at": state.updated_at_ms,
        });
        if let Ok(raw) = serde_json::to_vec(&status) {
            let _ = self.store.publish(&keys::task_status_channel(&state.task_id), raw).await;
        }
        if let Ok(raw) = serde_json::to_vec(state) {
            let _ = self.store.publish(&keys::task_state_channel(&state.task_id), raw).await;
        }
    }
}

#[cfg(test)]
#[path = "task_state_tests.rs"]
mod tests;

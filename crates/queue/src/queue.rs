// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue storage operations: enqueue, claim, finish, promotion, retention.

use gitfix_core::{Clock, JobEnvelope, JobId, JobOptions, JobPayload, JobState};
use gitfix_store::{KvStore, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Window after which a claimed job with no heartbeat is considered stalled.
pub const STALL_WINDOW: std::time::Duration = std::time::Duration::from_secs(60);

/// Priority scores pack `(priority, seq)` into an f64. The sequence counter
/// keeps FIFO order within a priority band; f64 holds integers exactly up
/// to 2^53, far beyond any realistic job count.
const PRIORITY_BAND: f64 = 1e12;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("job {0} not found")]
    JobNotFound(String),
    #[error("corrupt job record for {0}: {1}")]
    Corrupt(String, String),
}

/// Claim record kept in the active hash while a handler runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ActiveClaim {
    pub worker: String,
    pub claimed_at_ms: u64,
    pub heartbeat_at_ms: u64,
}

/// Durable queue handle. Cheap to clone; all state lives in the store.
pub struct Queue<C: Clock> {
    store: Arc<dyn KvStore>,
    name: String,
    clock: C,
}

impl<C: Clock> Clone for Queue<C> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), name: self.name.clone(), clock: self.clock.clone() }
    }
}

impl<C: Clock> Queue<C> {
    pub fn new(store: Arc<dyn KvStore>, name: impl Into<String>, clock: C) -> Self {
        Self { store, name: name.into(), clock }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // --- key layout ---

    fn key(&self, suffix: &str) -> String {
        format!("queue:{}:{}", self.name, suffix)
    }

    fn job_key(&self, job_id: &str) -> String {
        self.key(&format!("job:{job_id}"))
    }

    fn waiting_key(&self) -> String {
        self.key("waiting")
    }

    fn delayed_key(&self) -> String {
        self.key("delayed")
    }

    fn active_key(&self) -> String {
        self.key("active")
    }

    fn completed_key(&self) -> String {
        self.key("completed")
    }

    fn failed_key(&self) -> String {
        self.key("failed")
    }

    fn seq_key(&self) -> String {
        self.key("seq")
    }

    // --- envelope persistence ---

    async fn save(&self, envelope: &JobEnvelope) -> Result<(), QueueError> {
        let raw = serde_json::to_vec(envelope)
            .map_err(|e| QueueError::Corrupt(envelope.job_id.to_string(), e.to_string()))?;
        self.store.set(&self.job_key(envelope.job_id.as_str()), raw, None).await?;
        Ok(())
    }

    pub async fn load(&self, job_id: &str) -> Result<JobEnvelope, QueueError> {
        let raw = self
            .store
            .get(&self.job_key(job_id))
            .await?
            .ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;
        serde_json::from_slice(&raw)
            .map_err(|e| QueueError::Corrupt(job_id.to_string(), e.to_string()))
    }

    // --- enqueue ---

    /// Enqueue a payload. Returns the assigned job id.
    pub async fn enqueue(&self, payload: JobPayload, options: JobOptions) -> Result<JobId, QueueError> {
        let now = self.clock.epoch_ms();
        let envelope = JobEnvelope::new(payload, options, now);
        self.save(&envelope).await?;

        let member = envelope.job_id.as_str().as_bytes().to_vec();
        match envelope.delayed_until_ms {
            Some(ready_at) => {
                self.store.zadd(&self.delayed_key(), ready_at as f64, member).await?;
            }
            None => {
                let score = self.waiting_score(envelope.options.priority).await?;
                self.store.zadd(&self.waiting_key(), score, member).await?;
            }
        }
        tracing::info!(
            job_id = %envelope.job_id,
            kind = %envelope.kind(),
            delayed = envelope.delayed_until_ms.is_some(),
            "enqueued job"
        );
        Ok(envelope.job_id)
    }

    async fn waiting_score(&self, priority: i32) -> Result<f64, QueueError> {
        let seq = self.store.incr_by(&self.seq_key(), 1).await?;
        Ok(priority as f64 * PRIORITY_BAND + seq as f64)
    }

    // --- claim / heartbeat ---

    /// Move delayed jobs whose deadline has passed into the waiting set.
    pub async fn promote_delayed(&self) -> Result<usize, QueueError> {
        let now = self.clock.epoch_ms() as f64;
        let ready = self.store.zrange_by_score(&self.delayed_key(), f64::MIN, now).await?;
        let count = ready.len();
        for member in ready {
            self.store.zrem(&self.delayed_key(), &member).await?;
            let job_id = String::from_utf8_lossy(&member).to_string();
            let mut envelope = match self.load(&job_id).await {
                Ok(env) => env,
                Err(QueueError::JobNotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            envelope.state = JobState::Waiting;
            envelope.delayed_until_ms = None;
            self.save(&envelope).await?;
            let score = self.waiting_score(envelope.options.priority).await?;
            self.store.zadd(&self.waiting_key(), score, member).await?;
        }
        Ok(count)
    }

    /// Claim the next ready job for `worker`, marking it active and
    /// consuming one attempt. Returns `None` when the waiting set is empty.
    pub async fn claim_next(&self, worker: &str) -> Result<Option<JobEnvelope>, QueueError> {
        let Some((member, _)) = self.store.zpopmin(&self.waiting_key()).await? else {
            return Ok(None);
        };
        let job_id = String::from_utf8_lossy(&member).to_string();
        let mut envelope = match self.load(&job_id).await {
            Ok(env) => env,
            // Pruned under us; skip.
            Err(QueueError::JobNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let now = self.clock.epoch_ms();
        envelope.state = JobState::Active;
        envelope.attempt += 1;
        self.save(&envelope).await?;

        let claim = ActiveClaim { worker: worker.to_string(), claimed_at_ms: now, heartbeat_at_ms: now };
        let raw = serde_json::to_vec(&claim)
            .map_err(|e| QueueError::Corrupt(job_id.clone(), e.to_string()))?;
        self.store.hset(&self.active_key(), &job_id, raw).await?;
        Ok(Some(envelope))
    }

    /// Refresh the heartbeat on an active claim.
    pub async fn heartbeat(&self, job_id: &JobId) -> Result<(), QueueError> {
        let Some(raw) = self.store.hget(&self.active_key(), job_id.as_str()).await? else {
            return Ok(());
        };
        let mut claim: ActiveClaim = serde_json::from_slice(&raw)
            .map_err(|e| QueueError::Corrupt(job_id.to_string(), e.to_string()))?;
        claim.heartbeat_at_ms = self.clock.epoch_ms();
        let raw = serde_json::to_vec(&claim)
            .map_err(|e| QueueError::Corrupt(job_id.to_string(), e.to_string()))?;
        self.store.hset(&self.active_key(), job_id.as_str(), raw).await?;
        Ok(())
    }

    /// Update coarse progress on an active job. Non-blocking for callers in
    /// the sense that failures are swallowed into logs.
    pub async fn update_progress(&self, job_id: &JobId, progress: u8) {
        let result: Result<(), QueueError> = async {
            let mut envelope = self.load(job_id.as_str()).await?;
            envelope.progress = progress.min(100);
            self.save(&envelope).await
        }
        .await;
        if let Err(e) = result {
            tracing::debug!(job_id = %job_id, error = %e, "progress update dropped");
        }
    }

    // --- finish ---

    /// Record a successful handler run and apply completed-set retention.
    pub async fn complete(&self, job_id: &JobId) -> Result<JobEnvelope, QueueError> {
        let now = self.clock.epoch_ms();
        let mut envelope = self.load(job_id.as_str()).await?;
        envelope.state = JobState::Completed;
        envelope.finished_at_ms = Some(now);
        envelope.progress = 100;
        self.save(&envelope).await?;

        self.store.hdel(&self.active_key(), job_id.as_str()).await?;
        self.store
            .zadd(&self.completed_key(), now as f64, job_id.as_str().as_bytes().to_vec())
            .await?;
        self.prune_finished(&self.completed_key(), &envelope.options.remove_on_complete).await?;
        Ok(envelope)
    }

    /// Record a failed attempt: either schedule the retry under backoff or
    /// move the job to the failed set. Returns the updated envelope and
    /// whether the job is terminally failed.
    pub async fn fail_attempt(
        &self,
        job_id: &JobId,
        error: &str,
    ) -> Result<(JobEnvelope, bool), QueueError> {
        let now = self.clock.epoch_ms();
        let mut envelope = self.load(job_id.as_str()).await?;
        envelope.last_error = Some(error.to_string());
        self.store.hdel(&self.active_key(), job_id.as_str()).await?;

        if envelope.attempts_exhausted() {
            envelope.state = JobState::Failed;
            envelope.finished_at_ms = Some(now);
            self.save(&envelope).await?;
            self.store
                .zadd(&self.failed_key(), now as f64, job_id.as_str().as_bytes().to_vec())
                .await?;
            self.prune_finished(&self.failed_key(), &envelope.options.remove_on_fail).await?;
            return Ok((envelope, true));
        }

        let backoff = envelope.options.backoff_ms(envelope.attempt);
        envelope.state = JobState::Delayed;
        envelope.delayed_until_ms = Some(now + backoff);
        self.save(&envelope).await?;
        self.store
            .zadd(
                &self.delayed_key(),
                (now + backoff) as f64,
                job_id.as_str().as_bytes().to_vec(),
            )
            .await?;
        tracing::info!(job_id = %job_id, attempt = envelope.attempt, backoff_ms = backoff, "retry scheduled");
        Ok((envelope, false))
    }

    /// Return claimed-but-silent jobs to the waiting set.
    /// Returns the stalled job ids.
    pub async fn requeue_stalled(&self) -> Result<Vec<JobId>, QueueError> {
        let now = self.clock.epoch_ms();
        let cutoff = now.saturating_sub(STALL_WINDOW.as_millis() as u64);
        let mut stalled = Vec::new();
        for (job_id, raw) in self.store.hgetall(&self.active_key()).await? {
            let claim: ActiveClaim = match serde_json::from_slice(&raw) {
                Ok(c) => c,
                Err(_) => continue,
            };
            if claim.heartbeat_at_ms >= cutoff {
                continue;
            }
            self.store.hdel(&self.active_key(), &job_id).await?;
            let mut envelope = match self.load(&job_id).await {
                Ok(env) => env,
                Err(QueueError::JobNotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            envelope.state = JobState::Waiting;
            self.save(&envelope).await?;
            let score = self.waiting_score(envelope.options.priority).await?;
            self.store
                .zadd(&self.waiting_key(), score, job_id.as_bytes().to_vec())
                .await?;
            tracing::warn!(job_id = %job_id, worker = %claim.worker, "stalled job returned to waiting");
            stalled.push(JobId::from_string(job_id));
        }
        Ok(stalled)
    }

    /// Prune a finished set by age and count, deleting pruned job records.
    async fn prune_finished(
        &self,
        set_key: &str,
        window: &gitfix_core::RetentionWindow,
    ) -> Result<(), QueueError> {
        let cutoff = self.clock.epoch_ms().saturating_sub(window.age_ms) as f64;
        let expired = self.store.zrange_by_score(set_key, f64::MIN, cutoff).await?;
        for member in expired {
            self.store.zrem(set_key, &member).await?;
            let job_id = String::from_utf8_lossy(&member).to_string();
            self.store.del(&self.job_key(&job_id)).await?;
        }
        if let Some(cap) = window.count {
            while self.store.zcard(set_key).await? > cap {
                let Some((member, _)) = self.store.zpopmin(set_key).await? else {
                    break;
                };
                let job_id = String::from_utf8_lossy(&member).to_string();
                self.store.del(&self.job_key(&job_id)).await?;
            }
        }
        Ok(())
    }

    /// Return a claimed job to the waiting set without consuming the
    /// attempt (used when a consumer pops a kind it does not route).
    pub async fn release(&self, job_id: &JobId) -> Result<(), QueueError> {
        self.store.hdel(&self.active_key(), job_id.as_str()).await?;
        let mut envelope = self.load(job_id.as_str()).await?;
        envelope.attempt = envelope.attempt.saturating_sub(1);
        envelope.state = JobState::Waiting;
        self.save(&envelope).await?;
        let score = self.waiting_score(envelope.options.priority).await?;
        self.store
            .zadd(&self.waiting_key(), score, job_id.as_str().as_bytes().to_vec())
            .await?;
        Ok(())
    }

    // --- counts / admin ---

    pub async fn waiting_count(&self) -> Result<u64, QueueError> {
        Ok(self.store.zcard(&self.waiting_key()).await?)
    }

    pub async fn delayed_count(&self) -> Result<u64, QueueError> {
        Ok(self.store.zcard(&self.delayed_key()).await?)
    }

    pub async fn active_count(&self) -> Result<u64, QueueError> {
        Ok(self.store.hgetall(&self.active_key()).await?.len() as u64)
    }

    /// Delete every key belonging to this queue. Administrative reset.
    pub async fn obliterate(&self) -> Result<usize, QueueError> {
        let prefix = format!("queue:{}:", self.name);
        let keys = self.store.scan(&prefix).await?;
        let count = keys.len();
        for key in keys {
            self.store.del(&key).await?;
        }
        tracing::warn!(queue = %self.name, keys = count, "queue obliterated");
        Ok(count)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

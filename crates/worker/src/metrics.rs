// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metrics recorder: queue observer + aggregate counters in the KV store.

use async_trait::async_trait;
use gitfix_core::{
    keys, time_fmt, ActivityEvent, AiLogEntry, Clock, CorrelationId, HighCostAlert, JobEnvelope,
    JobId, JobPayload, ACTIVITY_LOG_CAP, HIGH_COST_ALERT_CAP,
};
use gitfix_queue::QueueObserver;
use gitfix_store::KvStore;
use std::sync::Arc;

/// Writes aggregate counters, per-model breakdowns, per-day rollups, the
/// time-ordered AI log, and high-cost alerts. Registered as a queue
/// observer at boot.
pub struct MetricsRecorder<C: Clock> {
    store: Arc<dyn KvStore>,
    clock: C,
    cost_threshold_usd: f64,
}

impl<C: Clock> MetricsRecorder<C> {
    pub fn new(store: Arc<dyn KvStore>, clock: C, cost_threshold_usd: f64) -> Self {
        Self { store, clock, cost_threshold_usd }
    }

    /// Append an activity event, keeping the log capped.
    pub async fn record_activity(
        &self,
        kind: &str,
        message: &str,
        correlation_id: Option<CorrelationId>,
    ) {
        let event = ActivityEvent {
            at_epoch_ms: self.clock.epoch_ms(),
            kind: kind.to_string(),
            message: message.to_string(),
            correlation_id,
        };
        let Ok(raw) = serde_json::to_vec(&event) else { return };
        let _ = self.store.lpush(keys::ACTIVITY_LOG, raw).await;
        let _ = self.store.ltrim(keys::ACTIVITY_LOG, 0, ACTIVITY_LOG_CAP as i64 - 1).await;
    }

    /// Streaming average update: `avg' = (avg*(n-1) + sample) / n`.
    async fn update_avg_time(&self, n: i64, sample_secs: f64) {
        if n <= 0 {
            return;
        }
        let current = self
            .store
            .get(keys::JOBS_AVG_TIME)
            .await
            .ok()
            .flatten()
            .and_then(|raw| String::from_utf8(raw).ok())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);
        let next = (current * (n - 1) as f64 + sample_secs) / n as f64;
        let _ = self
            .store
            .set(keys::JOBS_AVG_TIME, format!("{next:.3}").into_bytes(), None)
            .await;
    }

    async fn append_ai_log(&self, entry: &AiLogEntry, started_at_ms: u64) {
        if let Ok(raw) = serde_json::to_vec(entry) {
            let _ = self.store.zadd(keys::AI_LOG, started_at_ms as f64, raw).await;
        }
    }

    async fn record_model_metrics(&self, model: &str, success: bool, cost: f64, turns: u32, execution_ms: u64) {
        if model.is_empty() {
            return;
        }
        let model = gitfix_core::resolve_alias(model);
        let _ = self.store.sadd(keys::MODELS_USED, model.clone().into_bytes()).await;
        let field = if success { "successful" } else { "failed" };
        let _ = self.store.incr_by(&keys::model_metric(&model, field), 1).await;
        let _ = self.store.incr_by_float(&keys::model_metric(&model, "costUsd"), cost).await;
        let _ = self.store.incr_by(&keys::model_metric(&model, "turns"), turns as i64).await;
        let _ = self
            .store
            .incr_by(&keys::model_metric(&model, "executionTimeMs"), execution_ms as i64)
            .await;
    }

    async fn maybe_alert_high_cost(&self, entry: &AiLogEntry) {
        if entry.cost <= self.cost_threshold_usd {
            return;
        }
        let alert = HighCostAlert {
            cost_usd: entry.cost,
            threshold: self.cost_threshold_usd,
            correlation_id: entry.correlation_id.clone(),
            issue_number: entry.issue_number,
            repo: entry.repo.clone(),
            timestamp: self.clock.epoch_ms(),
        };
        if let Ok(raw) = serde_json::to_vec(&alert) {
            let _ = self.store.lpush(keys::HIGH_COST_ALERTS, raw).await;
            let _ = self
                .store
                .ltrim(keys::HIGH_COST_ALERTS, 0, HIGH_COST_ALERT_CAP as i64 - 1)
                .await;
        }
        tracing::warn!(
            cost_usd = entry.cost,
            threshold = self.cost_threshold_usd,
            repo = %entry.repo,
            issue = entry.issue_number,
            "high-cost agent run"
        );
    }

    /// Build the AI-log entry from the handler's result value, falling back
    /// to envelope data for fields the handler did not report.
    fn entry_from(job: &JobEnvelope, value: Option<&serde_json::Value>, status: &str) -> AiLogEntry {
        let (issue_number, repo, correlation) = match &job.payload {
            JobPayload::ImplementIssue(p) => (
                p.issue.number,
                p.issue.repo_slug(),
                p.issue.correlation_id.clone(),
            ),
            JobPayload::ApplyPrFollowup(p) => (
                p.pull_request_number,
                format!("{}/{}", p.repo_owner, p.repo_name),
                p.correlation_id.clone(),
            ),
            JobPayload::ImportTask(p) => {
                (p.issue.number, p.issue.repo_slug(), p.issue.correlation_id.clone())
            }
        };
        let get_str = |key: &str| {
            value
                .and_then(|v| v.get(key))
                .and_then(|s| s.as_str())
                .map(str::to_string)
        };
        AiLogEntry {
            cost: value
                .and_then(|v| v.get("costUsd"))
                .and_then(|c| c.as_f64())
                .unwrap_or(0.0),
            model: get_str("model").unwrap_or_default(),
            turns: value
                .and_then(|v| v.get("turns"))
                .and_then(|t| t.as_u64())
                .unwrap_or(0) as u32,
            execution_time_ms: value
                .and_then(|v| v.get("executionTimeMs"))
                .and_then(|t| t.as_u64())
                .unwrap_or(0),
            issue_number,
            repo,
            status: get_str("status").unwrap_or_else(|| status.to_string()),
            correlation_id: get_str("correlationId")
                .map(CorrelationId::from_string)
                .or(correlation)
                .unwrap_or_else(|| CorrelationId::from_string("corr-unknown")),
        }
    }
}

#[async_trait]
impl<C: Clock> QueueObserver for MetricsRecorder<C> {
    async fn on_completed(&self, job: &JobEnvelope, result: &serde_json::Value, duration_ms: u64) {
        let now = self.clock.epoch_ms();
        let day = time_fmt::day_bucket(now);
        let n = self.store.incr_by(keys::JOBS_PROCESSED, 1).await.unwrap_or(0);
        let _ = self.store.incr_by(&keys::jobs_processed_day(&day), 1).await;
        self.update_avg_time(n, duration_ms as f64 / 1000.0).await;

        let entry = Self::entry_from(job, Some(result), "success");
        let started_at = now.saturating_sub(duration_ms);
        self.append_ai_log(&entry, started_at).await;
        let success = !entry.status.contains("failed");
        self.record_model_metrics(&entry.model, success, entry.cost, entry.turns, entry.execution_time_ms)
            .await;
        self.maybe_alert_high_cost(&entry).await;
        self.record_activity(
            "job_completed",
            &format!("{} {} ({})", job.kind(), entry.repo, entry.status),
            Some(entry.correlation_id.clone()),
        )
        .await;
    }

    async fn on_failed(&self, job: &JobEnvelope, error: &str, attempts_made: u32) {
        let now = self.clock.epoch_ms();
        let day = time_fmt::day_bucket(now);
        let _ = self.store.incr_by(keys::JOBS_FAILED, 1).await;
        let _ = self.store.incr_by(&keys::jobs_failed_day(&day), 1).await;

        let entry = Self::entry_from(job, None, "failed");
        self.append_ai_log(&entry, now).await;
        if !entry.model.is_empty() {
            self.record_model_metrics(&entry.model, false, 0.0, 0, 0).await;
        }
        self.record_activity(
            "job_failed",
            &format!("{} {} after {} attempts: {}", job.kind(), entry.repo, attempts_made, error),
            Some(entry.correlation_id.clone()),
        )
        .await;
    }

    async fn on_stalled(&self, job_id: &JobId) {
        self.record_activity("job_stalled", &format!("job {job_id} returned to queue"), None)
            .await;
    }

    async fn on_error(&self, error: &str) {
        self.record_activity("queue_error", error, None).await;
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;

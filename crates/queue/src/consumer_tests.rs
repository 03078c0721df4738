// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::{JobError, JobResult, Queue, QueueObserver};
use async_trait::async_trait;
use gitfix_core::{FakeClock, IssuePayload, IssueRef, JobEnvelope, JobId, JobKind, JobOptions, JobPayload};
use gitfix_store::MemoryStore;
use parking_lot::Mutex;
use std::sync::Arc;

fn payload(number: u64) -> JobPayload {
    JobPayload::ImplementIssue(IssuePayload {
        issue: IssueRef::new("acme", "widget", number),
        base_branch: None,
    })
}

fn queue() -> (Queue<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    let store = Arc::new(MemoryStore::new(clock.clone()));
    (Queue::new(store, "test-queue", clock.clone()), clock)
}

struct RecordingHandler {
    seen: Arc<Mutex<Vec<JobId>>>,
    verdict: fn(&JobEnvelope) -> JobResult,
}

#[async_trait]
impl JobHandler for RecordingHandler {
    async fn handle(&self, job: JobEnvelope) -> JobResult {
        self.seen.lock().push(job.job_id.clone());
        (self.verdict)(&job)
    }
}

#[derive(Default)]
struct RecordingObserver {
    completed: Mutex<Vec<(JobId, serde_json::Value)>>,
    failed: Mutex<Vec<(JobId, String)>>,
    errors: Mutex<Vec<String>>,
}

#[async_trait]
impl QueueObserver for RecordingObserver {
    async fn on_completed(&self, job: &JobEnvelope, result: &serde_json::Value, _duration_ms: u64) {
        self.completed.lock().push((job.job_id.clone(), result.clone()));
    }

    async fn on_failed(&self, job: &JobEnvelope, error: &str, _attempts_made: u32) {
        self.failed.lock().push((job.job_id.clone(), error.to_string()));
    }

    async fn on_error(&self, error: &str) {
        self.errors.lock().push(error.to_string());
    }
}

async fn wait_until<F>(mut predicate: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if predicate() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn consume_runs_handler_and_notifies_completion() {
    let (queue, _) = queue();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(RecordingHandler {
        seen: seen.clone(),
        verdict: |_| Ok(serde_json::json!({"status": "success"})),
    });
    let observer = Arc::new(RecordingObserver::default());

    let job_id = queue.enqueue(payload(1), JobOptions::default()).await.unwrap();
    let handle = queue.consume(
        vec![JobKind::ImplementIssue],
        2,
        handler,
        vec![observer.clone()],
        "w1".to_string(),
    );

    wait_until(|| !observer.completed.lock().is_empty()).await;
    handle.shutdown().await;

    assert_eq!(seen.lock().as_slice(), &[job_id.clone()]);
    let completed = observer.completed.lock();
    assert_eq!(completed[0].0, job_id);
    assert_eq!(completed[0].1["status"], "success");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handler_error_retries_until_budget_exhausted() {
    let (queue, _) = queue();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(RecordingHandler {
        seen: seen.clone(),
        verdict: |_| Err(JobError::new("always fails")),
    });
    let observer = Arc::new(RecordingObserver::default());

    // Zero backoff so retries are immediate.
    let opts = JobOptions::default().attempts(3).backoff_base_ms(0);
    queue.enqueue(payload(1), opts).await.unwrap();
    let handle = queue.consume(
        vec![JobKind::ImplementIssue],
        1,
        handler,
        vec![observer.clone()],
        "w1".to_string(),
    );

    wait_until(|| !observer.failed.lock().is_empty()).await;
    handle.shutdown().await;

    assert_eq!(seen.lock().len(), 3);
    assert_eq!(observer.failed.lock()[0].1, "always fails");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unrouted_kind_is_released_not_burned() {
    let (queue, _) = queue();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(RecordingHandler {
        seen: seen.clone(),
        verdict: |_| Ok(serde_json::json!({})),
    });

    let job_id = queue.enqueue(payload(1), JobOptions::default()).await.unwrap();
    // Consumer only routes follow-up jobs.
    let handle = queue.consume(
        vec![JobKind::ApplyPrFollowup],
        1,
        handler,
        vec![],
        "w1".to_string(),
    );

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    handle.shutdown().await;

    assert!(seen.lock().is_empty());
    let job = queue.load(job_id.as_str()).await.unwrap();
    assert_eq!(job.attempt, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delayed_job_is_promoted_then_consumed() {
    let (queue, clock) = queue();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(RecordingHandler {
        seen: seen.clone(),
        verdict: |_| Ok(serde_json::json!({"status": "success"})),
    });
    let observer = Arc::new(RecordingObserver::default());

    queue
        .enqueue(payload(1), JobOptions::default().delay_ms(2_000u64))
        .await
        .unwrap();
    let handle = queue.consume(
        vec![JobKind::ImplementIssue],
        1,
        handler,
        vec![observer.clone()],
        "w1".to_string(),
    );

    // Not served while the delay holds.
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    assert!(seen.lock().is_empty());

    clock.advance(std::time::Duration::from_secs(3));
    wait_until(|| !observer.completed.lock().is_empty()).await;
    handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_drains_in_flight_handler() {
    let (queue, _) = queue();

    struct SlowHandler {
        finished: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl JobHandler for SlowHandler {
        async fn handle(&self, _job: JobEnvelope) -> JobResult {
            tokio::time::sleep(std::time::Duration::from_millis(400)).await;
            *self.finished.lock() = true;
            Ok(serde_json::json!({}))
        }
    }

    let finished = Arc::new(Mutex::new(false));
    queue.enqueue(payload(1), JobOptions::default()).await.unwrap();
    let handle = queue.consume(
        vec![JobKind::ImplementIssue],
        1,
        Arc::new(SlowHandler { finished: finished.clone() }),
        vec![],
        "w1".to_string(),
    );

    // Give the loop a moment to claim, then shut down mid-handler.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    handle.shutdown().await;

    assert!(*finished.lock(), "in-flight handler must complete before shutdown returns");
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The consume loop: claims ready jobs, runs handlers at bounded
//! concurrency, heartbeats active claims, and fires observers.

use crate::observer::QueueObserver;
use crate::queue::{Queue, STALL_WINDOW};
use crate::JobResult;
use async_trait::async_trait;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use gitfix_core::{Clock, JobEnvelope, JobKind};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Interval between claim/promotion sweeps when the queue is idle.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Handles one claimed job. The worker runtime registers a single handler
/// that routes on [`JobEnvelope::kind`].
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: JobEnvelope) -> JobResult;
}

/// Running consumer. Cancel stops intake; join drains in-flight handlers.
pub struct ConsumerHandle {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl ConsumerHandle {
    /// Stop claiming new jobs. In-flight handlers keep running.
    pub fn stop_intake(&self) {
        self.cancel.cancel();
    }

    /// Stop intake and wait for in-flight handlers to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "consumer task join failed");
        }
    }
}

impl<C: Clock> Queue<C> {
    /// Start the worker loop: claim jobs of `kinds` at `concurrency` and
    /// feed them to `handler`. Errors from the handler retry under the
    /// job's backoff policy; observers see completions, failures, stalls
    /// and loop errors.
    pub fn consume(
        &self,
        kinds: Vec<JobKind>,
        concurrency: usize,
        handler: Arc<dyn JobHandler>,
        observers: Vec<Arc<dyn QueueObserver>>,
        worker_name: String,
    ) -> ConsumerHandle {
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let queue = self.clone();
        let task = tokio::spawn(async move {
            run_loop(queue, kinds, concurrency, handler, observers, worker_name, loop_cancel).await;
        });
        ConsumerHandle { cancel, task }
    }
}

async fn run_loop<C: Clock>(
    queue: Queue<C>,
    kinds: Vec<JobKind>,
    concurrency: usize,
    handler: Arc<dyn JobHandler>,
    observers: Vec<Arc<dyn QueueObserver>>,
    worker_name: String,
    cancel: CancellationToken,
) {
    let concurrency = concurrency.max(1);
    let mut running: FuturesUnordered<tokio::task::JoinHandle<()>> = FuturesUnordered::new();

    loop {
        // Reap finished handler tasks without blocking.
        while let Some(joined) = running.next().now_or_never().flatten() {
            if let Err(e) = joined {
                tracing::error!(error = %e, "handler task panicked");
            }
        }

        if cancel.is_cancelled() {
            break;
        }

        if let Err(e) = sweep(&queue, &observers).await {
            notify_error(&observers, &e).await;
        }

        // Fill free slots.
        while running.len() < concurrency {
            match queue.claim_next(&worker_name).await {
                Ok(Some(job)) => {
                    if !kinds.contains(&job.kind()) {
                        if let Err(e) = queue.release(&job.job_id).await {
                            notify_error(&observers, &e.to_string()).await;
                        }
                        break;
                    }
                    running.push(spawn_job(
                        queue.clone(),
                        handler.clone(),
                        observers.clone(),
                        job,
                    ));
                }
                Ok(None) => break,
                Err(e) => {
                    notify_error(&observers, &e.to_string()).await;
                    break;
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            Some(joined) = running.next(), if !running.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "handler task panicked");
                }
            }
        }
    }

    // Drain in-flight handlers.
    while let Some(joined) = running.next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "handler task panicked during drain");
        }
    }
}

async fn sweep<C: Clock>(
    queue: &Queue<C>,
    observers: &[Arc<dyn QueueObserver>],
) -> Result<(), String> {
    queue.promote_delayed().await.map_err(|e| e.to_string())?;
    let stalled = queue.requeue_stalled().await.map_err(|e| e.to_string())?;
    for job_id in &stalled {
        for obs in observers {
            obs.on_stalled(job_id).await;
        }
    }
    Ok(())
}

fn spawn_job<C: Clock>(
    queue: Queue<C>,
    handler: Arc<dyn JobHandler>,
    observers: Vec<Arc<dyn QueueObserver>>,
    job: JobEnvelope,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let job_id = job.job_id.clone();
        let started = std::time::Instant::now();

        // Keep the claim fresh while the handler runs.
        let beat_queue = queue.clone();
        let beat_id = job_id.clone();
        let heartbeat = tokio::spawn(async move {
            let mut tick = tokio::time::interval(STALL_WINDOW / 3);
            tick.tick().await;
            loop {
                tick.tick().await;
                if let Err(e) = beat_queue.heartbeat(&beat_id).await {
                    tracing::debug!(job_id = %beat_id, error = %e, "claim heartbeat failed");
                }
            }
        });

        let result = handler.handle(job.clone()).await;
        heartbeat.abort();
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(value) => match queue.complete(&job_id).await {
                Ok(envelope) => {
                    for obs in &observers {
                        obs.on_completed(&envelope, &value, duration_ms).await;
                    }
                }
                Err(e) => notify_error(&observers, &e.to_string()).await,
            },
            Err(err) => match queue.fail_attempt(&job_id, &err.message).await {
                Ok((envelope, terminal)) => {
                    if terminal {
                        for obs in &observers {
                            obs.on_failed(&envelope, &err.message, envelope.attempt).await;
                        }
                    }
                }
                Err(e) => notify_error(&observers, &e.to_string()).await,
            },
        }
    })
}

async fn notify_error(observers: &[Arc<dyn QueueObserver>], error: &str) {
    tracing::error!(error, "queue consumer error");
    for obs in observers {
        obs.on_error(error).await;
    }
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;

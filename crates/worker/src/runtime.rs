// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker runtime: consumption, heartbeats, reset, graceful shutdown.

use crate::processor::{JobRouter, WorkerContext};
use gitfix_core::{
    keys, Clock, WorkerHeartbeat, HEARTBEAT_INTERVAL_SECS, HEARTBEAT_TTL_SECS,
    WORKER_ENTRY_TTL_SECS,
};
use gitfix_queue::{ConsumerHandle, QueueObserver};
use std::sync::Arc;
use std::time::Duration;

/// Interval between retention sweeps of retained worktrees.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Boot flags from the CLI.
#[derive(Debug, Clone, Default)]
pub struct BootOptions {
    /// Drain the queue and purge worker/state keys before consuming.
    pub reset: bool,
    /// Override the configured concurrency.
    pub concurrency: Option<usize>,
    /// Disable heartbeat publishing (testing).
    pub no_heartbeat: bool,
}

/// A started worker; dropping it does not stop the tasks — call
/// [`RunningWorker::shutdown`].
pub struct RunningWorker<C: Clock> {
    ctx: Arc<WorkerContext<C>>,
    consumer: ConsumerHandle,
    heartbeat: Option<tokio::task::JoinHandle<()>>,
    sweeper: tokio::task::JoinHandle<()>,
}

impl<C: Clock> RunningWorker<C> {
    /// Graceful shutdown: stop intake, drain in-flight handlers, remove
    /// this worker from the registry.
    pub async fn shutdown(self) {
        tracing::info!("shutting down: stopping intake and draining handlers");
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.abort();
        }
        self.sweeper.abort();
        self.consumer.shutdown().await;

        let worker_id = &self.ctx.config.worker_id;
        let _ = self.ctx.store.hdel(keys::WORKERS_HASH, worker_id.as_str()).await;
        let _ = self.ctx.store.del(&keys::worker_entry(worker_id)).await;
        tracing::info!(worker_id = %worker_id, "worker deregistered");
    }
}

pub struct WorkerRuntime<C: Clock> {
    ctx: Arc<WorkerContext<C>>,
}

impl<C: Clock> WorkerRuntime<C> {
    pub fn new(ctx: Arc<WorkerContext<C>>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<WorkerContext<C>> {
        &self.ctx
    }

    /// `--reset`: drain the queue and delete all worker-related keys
    /// before consuming anything.
    pub async fn reset_state(&self) -> Result<(), gitfix_store::StoreError> {
        if let Err(e) = self.ctx.queue.obliterate().await {
            tracing::error!(error = %e, "queue obliterate failed");
        }
        let mut purged = 0usize;
        for prefix in [keys::WORKER_PREFIX, "task:state:"] {
            for key in self.ctx.store.scan(prefix).await? {
                self.ctx.store.del(&key).await?;
                purged += 1;
            }
        }
        tracing::warn!(purged, "worker state reset");
        Ok(())
    }

    /// Start consuming. Registers the job router for every kind, begins
    /// heartbeating and the retention sweeper.
    pub async fn start(&self, opts: &BootOptions) -> RunningWorker<C> {
        if opts.reset {
            if let Err(e) = self.reset_state().await {
                tracing::error!(error = %e, "reset failed");
            }
        }

        let concurrency = opts.concurrency.unwrap_or(self.ctx.config.concurrency);
        let router = Arc::new(JobRouter::new(self.ctx.clone()));
        let observers: Vec<Arc<dyn QueueObserver>> = vec![self.ctx.metrics.clone()];

        let consumer = self.ctx.queue.consume(
            JobRouter::<C>::kinds(),
            concurrency,
            router,
            observers,
            self.ctx.config.worker_id.to_string(),
        );
        tracing::info!(
            queue = %self.ctx.queue.name(),
            concurrency,
            worker_id = %self.ctx.config.worker_id,
            "worker consuming"
        );

        let heartbeat = if opts.no_heartbeat {
            None
        } else {
            Some(spawn_heartbeat(self.ctx.clone(), concurrency))
        };
        let sweeper = spawn_sweeper(self.ctx.clone());

        RunningWorker { ctx: self.ctx.clone(), consumer, heartbeat, sweeper }
    }
}

/// Publish liveness every 30 s: the single worker key (TTL 90 s), the
/// fleet hash, and this worker's registry entry (TTL 120 s).
fn spawn_heartbeat<C: Clock>(
    ctx: Arc<WorkerContext<C>>,
    concurrency: usize,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let started_at_ms = ctx.clock.epoch_ms();
        let mut tick = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
        loop {
            tick.tick().await;
            let beat = WorkerHeartbeat {
                worker_id: ctx.config.worker_id.clone(),
                hostname: ctx.config.hostname.clone(),
                started_at_ms,
                heartbeat_at_ms: ctx.clock.epoch_ms(),
                concurrency,
                active_jobs: ctx.queue.active_count().await.unwrap_or(0) as usize,
            };
            let Ok(raw) = serde_json::to_vec(&beat) else { continue };

            let _ = ctx
                .store
                .set(
                    keys::WORKER_HEARTBEAT,
                    raw.clone(),
                    Some(Duration::from_secs(HEARTBEAT_TTL_SECS)),
                )
                .await;
            let _ = ctx
                .store
                .hset(keys::WORKERS_HASH, ctx.config.worker_id.as_str(), raw.clone())
                .await;

            let entry_key = keys::worker_entry(&ctx.config.worker_id);
            let _ = ctx
                .store
                .hset(&entry_key, "started", started_at_ms.to_string().into_bytes())
                .await;
            let _ = ctx
                .store
                .hset(&entry_key, "heartbeat", beat.heartbeat_at_ms.to_string().into_bytes())
                .await;
            let _ = ctx
                .store
                .expire(&entry_key, Duration::from_secs(WORKER_ENTRY_TTL_SECS))
                .await;
        }
    })
}

/// Periodically reap retained worktrees past their deadline.
fn spawn_sweeper<C: Clock>(ctx: Arc<WorkerContext<C>>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        tick.tick().await;
        loop {
            tick.tick().await;
            match ctx.workspaces.sweep_expired(ctx.config.max_age_hours).await {
                Ok(0) => {}
                Ok(reaped) => tracing::info!(reaped, "worktree sweep"),
                Err(e) => tracing::warn!(error = %e, "worktree sweep failed"),
            }
        }
    })
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;

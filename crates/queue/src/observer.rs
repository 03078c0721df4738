// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue lifecycle observers.
//!
//! The source system wired ad-hoc event emitters onto the queue; here the
//! callbacks are an explicit trait so consumers (the metrics recorder, the
//! activity log) register once at boot.

use async_trait::async_trait;
use gitfix_core::{JobEnvelope, JobId};

/// Callbacks fired by the consume loop. Implementations must not block the
/// worker for long; heavy work belongs on a spawned task.
#[async_trait]
pub trait QueueObserver: Send + Sync {
    /// A handler resolved successfully.
    async fn on_completed(&self, job: &JobEnvelope, result: &serde_json::Value, duration_ms: u64) {
        let _ = (job, result, duration_ms);
    }

    /// A handler failed with no attempts remaining.
    async fn on_failed(&self, job: &JobEnvelope, error: &str, attempts_made: u32) {
        let _ = (job, error, attempts_made);
    }

    /// A claimed job stopped heartbeating and was returned to the queue.
    async fn on_stalled(&self, job_id: &JobId) {
        let _ = job_id;
    }

    /// The consume loop itself hit an infrastructure error.
    async fn on_error(&self, error: &str) {
        let _ = error;
    }
}

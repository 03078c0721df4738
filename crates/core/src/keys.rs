// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical KV key and pub/sub channel formats.
//!
//! Every key the worker persists or publishes goes through this module so
//! the dashboard and the worker can never drift apart on spelling.

use crate::task::TaskId;
use crate::worker::WorkerId;

// --- task state ---

pub fn task_state(task_id: &TaskId) -> String {
    format!("worker:state:{task_id}")
}

pub const TASK_STATE_PREFIX: &str = "worker:state:";

// --- live channels ---

pub fn task_log_channel(task_id: &TaskId) -> String {
    format!("task-log:{task_id}")
}

pub fn task_diff_channel(task_id: &TaskId) -> String {
    format!("task-diff:{task_id}")
}

pub fn task_status_channel(task_id: &TaskId) -> String {
    format!("task-status:{task_id}")
}

pub fn task_state_channel(task_id: &TaskId) -> String {
    format!("task-state:{task_id}")
}

// --- worker registry ---

pub fn worker_entry(worker_id: &WorkerId) -> String {
    format!("worker:{worker_id}")
}

pub const WORKERS_HASH: &str = "system:status:workers";
pub const WORKER_HEARTBEAT: &str = "system:status:worker";
pub const WORKER_PREFIX: &str = "worker:";

// --- metrics ---

pub const JOBS_PROCESSED: &str = "metrics:jobs:processed";
pub const JOBS_FAILED: &str = "metrics:jobs:failed";
pub const JOBS_AVG_TIME: &str = "metrics:jobs:avgTime";
pub const AI_LOG: &str = "metrics:ai:log:v1";
pub const ACTIVITY_LOG: &str = "system:activity:log";
pub const MODELS_USED: &str = "llm:metrics:models:used";
pub const HIGH_COST_ALERTS: &str = "llm:metrics:alerts:highcost";

/// Per-day counter, `date` formatted as `YYYY-MM-DD`.
pub fn jobs_processed_day(date: &str) -> String {
    format!("metrics:jobs:processed:{date}")
}

pub fn jobs_failed_day(date: &str) -> String {
    format!("metrics:jobs:failed:{date}")
}

/// Per-model metric counter. `field` is one of
/// `successful|failed|costUsd|turns|executionTimeMs`.
pub fn model_metric(model: &str, field: &str) -> String {
    format!("llm:metrics:model:{model}:{field}")
}

// --- execution log locators ---

pub fn session_log(session_id: &str) -> String {
    format!("execution:logs:session:{session_id}")
}

pub fn conversation_log(conversation_id: &str) -> String {
    format!("execution:logs:conversation:{conversation_id}")
}

#[cfg(test)]
#[path = "keys_tests.rs"]
mod tests;

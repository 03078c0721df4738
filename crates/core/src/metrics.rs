// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metric record shapes written to the KV store.

use crate::id::CorrelationId;
use serde::{Deserialize, Serialize};

/// One entry in the time-ordered `metrics:ai:log:v1` sorted set,
/// scored by job start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiLogEntry {
    pub cost: f64,
    pub model: String,
    pub turns: u32,
    #[serde(rename = "executionTimeMs")]
    pub execution_time_ms: u64,
    #[serde(rename = "issueNumber")]
    pub issue_number: u64,
    pub repo: String,
    /// `success`, `failed`, or a handled tag such as `claude_success_no_changes`.
    pub status: String,
    #[serde(rename = "correlationId")]
    pub correlation_id: CorrelationId,
}

/// One entry in the capped `system:activity:log` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub at_epoch_ms: u64,
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
}

/// Alert pushed to `llm:metrics:alerts:highcost` when a run exceeds the
/// configured cost threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighCostAlert {
    #[serde(rename = "costUsd")]
    pub cost_usd: f64,
    pub threshold: f64,
    #[serde(rename = "correlationId")]
    pub correlation_id: CorrelationId,
    #[serde(rename = "issueNumber")]
    pub issue_number: u64,
    pub repo: String,
    pub timestamp: u64,
}

/// Cap applied to `system:activity:log`.
pub const ACTIVITY_LOG_CAP: u64 = 1000;

/// Cap applied to `llm:metrics:alerts:highcost`.
pub const HIGH_COST_ALERT_CAP: u64 = 10;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker identity and heartbeat record.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Unique identifier for a worker process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate an id from hostname + random suffix, the form reported to
    /// the workers registry.
    pub fn generate(hostname: &str) -> Self {
        Self(format!("{}-{}", hostname, nanoid::nanoid!(6)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for WorkerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Heartbeat payload stored in the workers registry hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerHeartbeat {
    pub worker_id: WorkerId,
    pub hostname: String,
    pub started_at_ms: u64,
    pub heartbeat_at_ms: u64,
    pub concurrency: usize,
    pub active_jobs: usize,
}

/// Interval between heartbeats.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// TTL on the single `system:status:worker` heartbeat key.
pub const HEARTBEAT_TTL_SECS: u64 = 90;

/// TTL on per-worker registry entries; consumers treat entries older than
/// 2x the heartbeat interval as gone.
pub const WORKER_ENTRY_TTL_SECS: u64 = 120;

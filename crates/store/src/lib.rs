// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gitfix-store: typed accessor over the shared datastore.
//!
//! The worker, the queue and the dashboard all synchronize through this
//! interface. Values are byte strings; callers handle encoding. There is no
//! cross-operation transaction: where atomicity is needed, callers lean on a
//! single primitive (e.g. `set_nx` with TTL to claim a lock, `lpop` to claim
//! a queue item).

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Operation applied to a key holding another data type.
    #[error("wrong type for key {0}")]
    WrongType(String),
    /// Backend connectivity failure (network-backed implementations).
    #[error("store connection error: {0}")]
    Connection(String),
}

/// A live subscription to one pub/sub channel.
///
/// Messages published while the subscriber lags beyond the channel buffer
/// are dropped, matching at-most-once pub/sub semantics.
pub struct Subscription {
    rx: broadcast::Receiver<Vec<u8>>,
}

impl Subscription {
    pub fn new(rx: broadcast::Receiver<Vec<u8>>) -> Self {
        Self { rx }
    }

    /// Receive the next message; `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.rx.recv().await {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "pub/sub subscriber lagged, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive for polling consumers.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.rx.try_recv() {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

/// The datastore capability.
///
/// Modeled on the subset of a Redis-style API the worker actually uses;
/// the in-memory implementation in [`memory`] is both the test double and
/// the single-process deployment default.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    // --- strings ---
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), StoreError>;
    /// Set only if absent. Returns true when the value was written.
    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool, StoreError>;
    async fn del(&self, key: &str) -> Result<bool, StoreError>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    // --- counters ---
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError>;
    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64, StoreError>;

    // --- lists ---
    async fn lpush(&self, key: &str, value: Vec<u8>) -> Result<u64, StoreError>;
    async fn rpush(&self, key: &str, value: Vec<u8>) -> Result<u64, StoreError>;
    async fn lpop(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    /// Negative indices count from the tail, Redis-style.
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>, StoreError>;
    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), StoreError>;
    async fn llen(&self, key: &str) -> Result<u64, StoreError>;

    // --- sorted sets ---
    async fn zadd(&self, key: &str, score: f64, member: Vec<u8>) -> Result<bool, StoreError>;
    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<Vec<u8>>, StoreError>;
    async fn zrem(&self, key: &str, member: &[u8]) -> Result<bool, StoreError>;
    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<u64, StoreError>;
    /// Pop the lowest-scored member.
    async fn zpopmin(&self, key: &str) -> Result<Option<(Vec<u8>, f64)>, StoreError>;
    async fn zcard(&self, key: &str) -> Result<u64, StoreError>;

    // --- hashes ---
    async fn hset(&self, key: &str, field: &str, value: Vec<u8>) -> Result<(), StoreError>;
    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError>;
    async fn hdel(&self, key: &str, field: &str) -> Result<bool, StoreError>;
    async fn hgetall(&self, key: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError>;

    // --- sets ---
    async fn sadd(&self, key: &str, member: Vec<u8>) -> Result<bool, StoreError>;
    async fn smembers(&self, key: &str) -> Result<Vec<Vec<u8>>, StoreError>;

    // --- pub/sub ---
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<usize, StoreError>;
    async fn subscribe(&self, channel: &str) -> Result<Subscription, StoreError>;

    // --- keyspace ---
    async fn scan(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

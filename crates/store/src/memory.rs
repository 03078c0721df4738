// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory datastore with lazy TTL eviction and broadcast pub/sub.

use crate::{KvStore, StoreError, Subscription};
use async_trait::async_trait;
use gitfix_core::Clock;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const PUBSUB_BUFFER: usize = 256;

#[derive(Default)]
struct Inner {
    strings: HashMap<String, Vec<u8>>,
    lists: HashMap<String, VecDeque<Vec<u8>>>,
    /// Kept sorted by (score, member).
    zsets: HashMap<String, Vec<(f64, Vec<u8>)>>,
    hashes: HashMap<String, HashMap<String, Vec<u8>>>,
    sets: HashMap<String, HashSet<Vec<u8>>>,
    /// Epoch-ms deadline per key, across all data types.
    expiries: HashMap<String, u64>,
    channels: HashMap<String, broadcast::Sender<Vec<u8>>>,
}

impl Inner {
    fn remove_key(&mut self, key: &str) -> bool {
        let mut removed = false;
        removed |= self.strings.remove(key).is_some();
        removed |= self.lists.remove(key).is_some();
        removed |= self.zsets.remove(key).is_some();
        removed |= self.hashes.remove(key).is_some();
        removed |= self.sets.remove(key).is_some();
        self.expiries.remove(key);
        removed
    }

    fn key_exists(&self, key: &str) -> bool {
        self.strings.contains_key(key)
            || self.lists.contains_key(key)
            || self.zsets.contains_key(key)
            || self.hashes.contains_key(key)
            || self.sets.contains_key(key)
    }

    /// Drop the key if its deadline has passed.
    fn evict_if_expired(&mut self, key: &str, now_ms: u64) {
        if let Some(&deadline) = self.expiries.get(key) {
            if deadline <= now_ms {
                self.remove_key(key);
            }
        }
    }

    /// Resolve Redis-style negative indices against a list length.
    fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
        let len = len as i64;
        let mut start = if start < 0 { len + start } else { start };
        let mut stop = if stop < 0 { len + stop } else { stop };
        start = start.max(0);
        stop = stop.min(len - 1);
        if start > stop || len == 0 {
            None
        } else {
            Some((start as usize, stop as usize))
        }
    }
}

/// Shared in-memory store. Cloning yields a handle onto the same data.
pub struct MemoryStore<C: Clock> {
    inner: Arc<Mutex<Inner>>,
    clock: C,
}

impl<C: Clock> Clone for MemoryStore<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner), clock: self.clock.clone() }
    }
}

impl<C: Clock> MemoryStore<C> {
    pub fn new(clock: C) -> Self {
        Self { inner: Arc::new(Mutex::new(Inner::default())), clock }
    }

    fn now_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }
}

#[async_trait]
impl<C: Clock> KvStore for MemoryStore<C> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut inner = self.inner.lock();
        inner.evict_if_expired(key, self.now_ms());
        Ok(inner.strings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.strings.insert(key.to_string(), value);
        match ttl {
            Some(ttl) => {
                let deadline = self.now_ms() + ttl.as_millis() as u64;
                inner.expiries.insert(key.to_string(), deadline);
            }
            None => {
                inner.expiries.remove(key);
            }
        }
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool, StoreError> {
        let now = self.now_ms();
        let mut inner = self.inner.lock();
        inner.evict_if_expired(key, now);
        if inner.key_exists(key) {
            return Ok(false);
        }
        inner.strings.insert(key.to_string(), value);
        if let Some(ttl) = ttl {
            inner.expiries.insert(key.to_string(), now + ttl.as_millis() as u64);
        }
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().remove_key(key))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = self.now_ms();
        let mut inner = self.inner.lock();
        inner.evict_if_expired(key, now);
        if !inner.key_exists(key) {
            return Ok(false);
        }
        inner.expiries.insert(key.to_string(), now + ttl.as_millis() as u64);
        Ok(true)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let now = self.now_ms();
        let mut inner = self.inner.lock();
        inner.evict_if_expired(key, now);
        let current = match inner.strings.get(key) {
            Some(raw) => std::str::from_utf8(raw)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(|| StoreError::WrongType(key.to_string()))?,
            None => 0,
        };
        let next = current + delta;
        inner.strings.insert(key.to_string(), next.to_string().into_bytes());
        Ok(next)
    }

    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64, StoreError> {
        let now = self.now_ms();
        let mut inner = self.inner.lock();
        inner.evict_if_expired(key, now);
        let current = match inner.strings.get(key) {
            Some(raw) => std::str::from_utf8(raw)
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| StoreError::WrongType(key.to_string()))?,
            None => 0.0,
        };
        let next = current + delta;
        inner.strings.insert(key.to_string(), format!("{}", next).into_bytes());
        Ok(next)
    }

    async fn lpush(&self, key: &str, value: Vec<u8>) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let list = inner.lists.entry(key.to_string()).or_default();
        list.push_front(value);
        Ok(list.len() as u64)
    }

    async fn rpush(&self, key: &str, value: Vec<u8>) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let list = inner.lists.entry(key.to_string()).or_default();
        list.push_back(value);
        Ok(list.len() as u64)
    }

    async fn lpop(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut inner = self.inner.lock();
        Ok(inner.lists.get_mut(key).and_then(|l| l.pop_front()))
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>, StoreError> {
        let inner = self.inner.lock();
        let Some(list) = inner.lists.get(key) else {
            return Ok(Vec::new());
        };
        match Inner::resolve_range(list.len(), start, stop) {
            Some((lo, hi)) => Ok(list.iter().skip(lo).take(hi - lo + 1).cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let Some(list) = inner.lists.get_mut(key) else {
            return Ok(());
        };
        match Inner::resolve_range(list.len(), start, stop) {
            Some((lo, hi)) => {
                let kept: VecDeque<Vec<u8>> =
                    list.iter().skip(lo).take(hi - lo + 1).cloned().collect();
                *list = kept;
            }
            None => {
                list.clear();
            }
        }
        Ok(())
    }

    async fn llen(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.inner.lock().lists.get(key).map_or(0, |l| l.len() as u64))
    }

    async fn zadd(&self, key: &str, score: f64, member: Vec<u8>) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let zset = inner.zsets.entry(key.to_string()).or_default();
        let fresh = match zset.iter().position(|(_, m)| *m == member) {
            Some(idx) => {
                zset.remove(idx);
                false
            }
            None => true,
        };
        let at = zset
            .binary_search_by(|(s, m)| {
                s.partial_cmp(&score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| m.as_slice().cmp(member.as_slice()))
            })
            .unwrap_or_else(|i| i);
        zset.insert(at, (score, member));
        Ok(fresh)
    }

    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<Vec<u8>>, StoreError> {
        let inner = self.inner.lock();
        let Some(zset) = inner.zsets.get(key) else {
            return Ok(Vec::new());
        };
        Ok(zset
            .iter()
            .filter(|(s, _)| *s >= min && *s <= max)
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn zrem(&self, key: &str, member: &[u8]) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let Some(zset) = inner.zsets.get_mut(key) else {
            return Ok(false);
        };
        match zset.iter().position(|(_, m)| m == member) {
            Some(idx) => {
                zset.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let Some(zset) = inner.zsets.get_mut(key) else {
            return Ok(0);
        };
        let before = zset.len();
        zset.retain(|(s, _)| *s < min || *s > max);
        Ok((before - zset.len()) as u64)
    }

    async fn zpopmin(&self, key: &str) -> Result<Option<(Vec<u8>, f64)>, StoreError> {
        let mut inner = self.inner.lock();
        let Some(zset) = inner.zsets.get_mut(key) else {
            return Ok(None);
        };
        if zset.is_empty() {
            return Ok(None);
        }
        let (score, member) = zset.remove(0);
        Ok(Some((member, score)))
    }

    async fn zcard(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.inner.lock().zsets.get(key).map_or(0, |z| z.len() as u64))
    }

    async fn hset(&self, key: &str, field: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut inner = self.inner.lock();
        inner.evict_if_expired(key, self.now_ms());
        Ok(inner.hashes.get(key).and_then(|h| h.get(field).cloned()))
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        Ok(inner.hashes.get_mut(key).is_some_and(|h| h.remove(field).is_some()))
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let mut inner = self.inner.lock();
        inner.evict_if_expired(key, self.now_ms());
        Ok(inner
            .hashes
            .get(key)
            .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn sadd(&self, key: &str, member: Vec<u8>) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        Ok(inner.sets.entry(key.to_string()).or_default().insert(member))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.sets.get(key).map(|s| s.iter().cloned().collect()).unwrap_or_default())
    }

    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<usize, StoreError> {
        let inner = self.inner.lock();
        match inner.channels.get(channel) {
            Some(tx) => Ok(tx.send(payload).unwrap_or(0)),
            None => Ok(0),
        }
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, StoreError> {
        let mut inner = self.inner.lock();
        let tx = inner
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(PUBSUB_BUFFER).0);
        Ok(Subscription::new(tx.subscribe()))
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let now = self.now_ms();
        let mut inner = self.inner.lock();
        let expired: Vec<String> = inner
            .expiries
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            inner.remove_key(&key);
        }
        let mut keys: Vec<String> = inner
            .strings
            .keys()
            .chain(inner.lists.keys())
            .chain(inner.zsets.keys())
            .chain(inner.hashes.keys())
            .chain(inner.sets.keys())
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

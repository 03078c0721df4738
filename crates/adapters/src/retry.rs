// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared retry helper for forge calls.

use std::future::Future;
use std::time::Duration;

/// Errors that can opt into automatic retry.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Exponential backoff policy mirroring the queue's defaults.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, base_delay: Duration::from_millis(2000) }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt (1-based attempt that just failed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(10);
        self.base_delay.saturating_mul(1 << exp)
    }
}

/// Run `op` until it succeeds, the error is non-retryable, or the attempt
/// budget is spent.
pub async fn with_retry<T, E, F, Fut>(label: &str, policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.attempts && err.is_retryable() => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(label, attempt, error = %err, delay_ms = delay.as_millis() as u64, "retryable failure");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Message-level retry classification shared by forge implementations:
/// rate limits, timeouts and transient upstream hiccups.
pub fn retryable_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    ["rate limit", "timeout", "timed out", "temporar", "try again"]
        .iter()
        .any(|needle| lower.contains(needle))
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;

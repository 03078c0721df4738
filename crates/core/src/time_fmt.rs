// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-readable time formatting for comments and reports.

use chrono::{DateTime, Utc};

/// Format elapsed milliseconds as `Ns` / `Nm Ns` / `Nh Nm`.
pub fn format_elapsed_ms(ms: u64) -> String {
    let secs = ms / 1000;
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Format a unix-seconds timestamp as a human-readable UTC instant,
/// used in usage-limit comments.
pub fn format_epoch_secs(epoch_secs: u64) -> String {
    match DateTime::<Utc>::from_timestamp(epoch_secs as i64, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("epoch+{}s", epoch_secs),
    }
}

/// `YYYY-MM-DD` bucket for per-day metric counters.
pub fn day_bucket(epoch_ms: u64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(epoch_ms as i64) {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => "unknown".to_string(),
    }
}

/// `YYYYMMDD-HHMM` stamp embedded in branch names.
pub fn branch_stamp(epoch_ms: u64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(epoch_ms as i64) {
        Some(dt) => dt.format("%Y%m%d-%H%M").to_string(),
        None => "00000000-0000".to_string(),
    }
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Usage-limit detection in provider output.

/// Scan raw agent output for a quota-exhaustion marker and extract the
/// reset timestamp (unix seconds).
///
/// The provider emits `Claude AI usage limit reached|{epoch}`; some paths
/// wrap it in JSON, so the scan is substring-based and takes the number
/// after the last `|` on the matching line.
pub fn parse_usage_limit_reset(output: &str) -> Option<u64> {
    for line in output.lines() {
        let lower = line.to_ascii_lowercase();
        if !lower.contains("usage limit reached") {
            continue;
        }
        if let Some(idx) = line.rfind('|') {
            let tail: String = line[idx + 1..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if let Ok(epoch) = tail.parse::<u64>() {
                return Some(epoch);
            }
        }
    }
    None
}

#[cfg(test)]
#[path = "usage_tests.rs"]
mod tests;

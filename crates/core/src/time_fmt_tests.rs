// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    seconds = { 42_000, "42s" },
    minutes = { 90_000, "1m 30s" },
    hours   = { 3_725_000, "1h 2m" },
    zero    = { 0, "0s" },
)]
fn elapsed_formatting(ms: u64, expected: &str) {
    assert_eq!(format_elapsed_ms(ms), expected);
}

#[test]
fn epoch_formatting() {
    // 2023-11-14 22:13:20 UTC
    assert_eq!(format_epoch_secs(1_700_000_000), "2023-11-14 22:13:20 UTC");
}

#[test]
fn day_bucket_format() {
    assert_eq!(day_bucket(1_700_000_000_000), "2023-11-14");
}

#[test]
fn branch_stamp_format() {
    assert_eq!(branch_stamp(1_700_000_000_000), "20231114-2213");
}

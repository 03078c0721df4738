// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_epoch_is_sane() {
    let clock = SystemClock;
    // After 2023-01-01, before 2100.
    assert!(clock.epoch_ms() > 1_672_531_200_000);
    assert!(clock.epoch_ms() < 4_102_444_800_000);
}

#[test]
fn fake_clock_advance_moves_both_timelines() {
    let clock = FakeClock::new();
    let t0 = clock.now();
    let e0 = clock.epoch_ms();

    clock.advance(Duration::from_millis(1500));

    assert_eq!(clock.now() - t0, Duration::from_millis(1500));
    assert_eq!(clock.epoch_ms() - e0, 1500);
}

#[test]
fn fake_clock_set_epoch_ms() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(42_000);
    assert_eq!(clock.epoch_ms(), 42_000);
    assert_eq!(clock.epoch_secs(), 42);
}

#[test]
fn epoch_secs_truncates() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1999);
    assert_eq!(clock.epoch_secs(), 1);
}

#[test]
fn clones_share_state() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_secs(5));
    assert_eq!(other.epoch_ms(), clock.epoch_ms());
}

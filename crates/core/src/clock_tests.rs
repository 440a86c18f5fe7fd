// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_advances() {
    let clock = SystemClock;
    let a = clock.epoch_ms();
    let b = clock.epoch_ms();
    assert!(b >= a);
}

#[test]
fn fake_clock_starts_at_the_anchor() {
    let clock = FakeClock::new();
    assert_eq!(clock.epoch_ms(), FAKE_EPOCH_START_MS);
}

#[test]
fn advance_moves_both_faces_in_lockstep() {
    let clock = FakeClock::new();
    let start_ms = clock.epoch_ms();
    let start = clock.now();

    clock.advance(Duration::from_secs(5));
    assert_eq!(clock.epoch_ms(), start_ms + 5_000);
    assert_eq!(clock.now(), start + Duration::from_secs(5));

    clock.advance(Duration::from_millis(250));
    assert_eq!(clock.epoch_ms(), start_ms + 5_250);
    assert_eq!(clock.now(), start + Duration::from_millis(5_250));
}

#[test]
fn set_epoch_ms_reanchors() {
    let clock = FakeClock::new();
    clock.advance(Duration::from_secs(10));

    clock.set_epoch_ms(42);
    assert_eq!(clock.epoch_ms(), 42);

    clock.advance(Duration::from_secs(1));
    assert_eq!(clock.epoch_ms(), 1_042);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_millis(250));
    assert_eq!(other.epoch_ms(), clock.epoch_ms());
    assert_eq!(other.now(), clock.now());
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time sources.
//!
//! Every persisted timestamp in the store — enqueue times, lock heartbeats,
//! `query_at` backoffs, the halt flag — is a wall-clock unix epoch in
//! milliseconds, while loop pacing and outage-grace accounting use the
//! monotonic clock. [`Clock`] carries both faces so daemons, the queue
//! service, and tests share one time source.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Paired monotonic + wall-clock time source.
pub trait Clock: Clone + Send + Sync {
    /// Monotonic instant for pacing and elapsed-time math.
    fn now(&self) -> Instant;

    /// Wall-clock unix epoch in milliseconds; the store's timestamp unit.
    fn epoch_ms(&self) -> u64;
}

/// The real clocks.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Epoch the fake clock is anchored at until re-anchored (a fixed,
/// recognizable point far from zero so backoff subtraction never wraps).
const FAKE_EPOCH_START_MS: u64 = 1_000_000_000;

/// Controllable clock for tests.
///
/// A single shared millisecond offset drives both faces: advancing the
/// clock moves `now()` and `epoch_ms()` in lockstep, and clones handed to
/// workers, schedulers, and queue handles all observe the same time.
#[derive(Clone)]
pub struct FakeClock {
    started: Instant,
    epoch_base: Arc<AtomicU64>,
    offset_ms: Arc<AtomicU64>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            epoch_base: Arc::new(AtomicU64::new(FAKE_EPOCH_START_MS)),
            offset_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Advance both faces by the given duration.
    pub fn advance(&self, duration: Duration) {
        self.offset_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    /// Re-anchor the wall clock at an absolute epoch value and restart the
    /// offset from there.
    pub fn set_epoch_ms(&self, ms: u64) {
        self.epoch_base.store(ms, Ordering::SeqCst);
        self.offset_ms.store(0, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.started + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }

    fn epoch_ms(&self) -> u64 {
        self.epoch_base.load(Ordering::SeqCst) + self.offset_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;

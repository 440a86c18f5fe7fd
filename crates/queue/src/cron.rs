// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron schedule evaluation for the scheduler daemon.
//!
//! Job classes declare standard five-field cron expressions with minute
//! resolution; the `cron` crate wants a leading seconds field, so five-field
//! expressions are normalized with a `0` prefix.

use std::str::FromStr;

use chrono::DateTime;

use crate::error::QueueError;

pub use ::cron::Schedule;

/// Parse a schedule expression, accepting the five-field form.
pub fn parse_schedule(expr: &str) -> Result<Schedule, QueueError> {
    let fields = expr.split_whitespace().count();
    let normalized = if fields == 5 {
        format!("0 {}", expr)
    } else {
        expr.to_string()
    };
    Schedule::from_str(&normalized)
        .map_err(|e| QueueError::Setup(format!("invalid schedule '{}': {}", expr, e)))
}

/// True when the schedule has a trigger boundary in `(after_ms, now_ms]`.
///
/// Any number of missed boundaries in the window collapses to a single
/// `true` — the scheduler coalesces gaps to one enqueue per class.
pub fn due_between(schedule: &Schedule, after_ms: u64, now_ms: u64) -> bool {
    if now_ms <= after_ms {
        return false;
    }
    let (Some(after), Some(now)) = (
        DateTime::from_timestamp_millis(after_ms as i64),
        DateTime::from_timestamp_millis(now_ms as i64),
    ) else {
        return false;
    };
    schedule.after(&after).next().is_some_and(|t| t <= now)
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;

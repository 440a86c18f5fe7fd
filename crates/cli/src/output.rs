// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Small display helpers shared by the view commands.

use gantry_core::JobRecord;

/// Relative age (e.g. "5s", "2m", "1h") of an epoch-ms timestamp.
pub fn format_age(now_ms: u64, epoch_ms: u64) -> String {
    if epoch_ms == 0 {
        return "-".to_string();
    }
    gantry_core::format_elapsed_ms(now_ms.saturating_sub(epoch_ms))
}

/// Runtime cell: live-adjusted seconds with one decimal.
pub fn format_runtime(job: &JobRecord, now_ms: u64) -> String {
    format!("{:.1}s", job.live_runtime(now_ms))
}

/// Progress cell: whole percent of the last report.
pub fn format_progress(job: &JobRecord) -> String {
    let value = job.progress.as_ref().map(|p| p.value).unwrap_or(0.0);
    format!("{:3.0}%", value * 100.0)
}

/// Priority cell with the force marker (`007F` means priority 7, forced).
pub fn format_priority(job: &JobRecord) -> String {
    format!("{:03}{}", job.priority, if job.force { "F" } else { " " })
}

/// Attempt cell: used/total.
pub fn format_attempts(job: &JobRecord) -> String {
    format!("{}/{}", job.attempts_used(), job.attempts)
}

/// Worker cell: lock owner while running, empty otherwise.
pub fn format_worker(job: &JobRecord) -> String {
    job.locked
        .as_ref()
        .map(|l| l.worker.clone())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gantry_core::test_support::job_record;
use gantry_core::{JobState, LockInfo, Progress};

#[test]
fn age_is_relative() {
    assert_eq!(format_age(61_000, 1_000), "1m");
    assert_eq!(format_age(5_000, 0), "-");
}

#[test]
fn runtime_is_live_for_running_jobs() {
    let mut job = job_record("acme.jobs.Report", 1_000);
    job.state = JobState::Running;
    job.started_at = Some(10_000);
    assert_eq!(format_runtime(&job, 12_500), "2.5s");
}

#[test]
fn progress_defaults_to_zero() {
    let mut job = job_record("acme.jobs.Report", 1_000);
    assert_eq!(format_progress(&job), "  0%");

    job.progress = Some(Progress {
        value: 0.42,
        message: None,
        at: 2_000,
    });
    assert_eq!(format_progress(&job), " 42%");
}

#[test]
fn priority_carries_force_marker() {
    let mut job = job_record("acme.jobs.Report", 1_000);
    job.priority = 7;
    assert_eq!(format_priority(&job), "007 ");
    job.force = true;
    assert_eq!(format_priority(&job), "007F");
}

#[test]
fn attempts_and_worker_cells() {
    let mut job = job_record("acme.jobs.Report", 1_000);
    job.attempts = 3;
    job.attempts_left = 2;
    assert_eq!(format_attempts(&job), "1/3");
    assert_eq!(format_worker(&job), "");

    job.locked = Some(LockInfo {
        worker: "host:worker:w".into(),
        acquired: 1_000,
        heartbeat: 1_000,
    });
    assert_eq!(format_worker(&job), "host:worker:w");
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders shared by tests across crates.

use crate::id::JobId;
use crate::job::{fingerprint, Enqueued, JobRecord, JobState};
use serde_json::{Map, Value};

/// A pending job record with sane defaults, enqueued at `at` epoch ms.
pub fn job_record(name: &str, at: u64) -> JobRecord {
    job_record_with_args(name, at, Map::new())
}

/// A pending job record with explicit arguments.
pub fn job_record_with_args(name: &str, at: u64, args: Map<String, Value>) -> JobRecord {
    JobRecord {
        id: JobId::generate(at),
        name: name.to_string(),
        fingerprint: fingerprint(name, &args),
        args,
        state: JobState::Pending,
        priority: 0,
        attempts: 1,
        attempts_left: 1,
        force: false,
        enqueued: Enqueued {
            username: "tester".to_string(),
            at,
        },
        query_at: at,
        started_at: None,
        finished_at: None,
        runtime: 0.0,
        locked: None,
        zombie_at: None,
        wall_at: None,
        removed_at: None,
        killed_at: None,
        progress: None,
        schedule: None,
        defer_time: 300,
        defer_max: Some(3_600),
        wall_time: None,
        zombie_time: 1_800,
        wall_kill: false,
        error: None,
        revision: 0,
    }
}

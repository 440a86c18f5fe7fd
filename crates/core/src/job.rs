// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and lifecycle state machine.

use crate::id::JobId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle state of a job.
///
/// Claimable states ({pending, deferred, failed}) are eligible for the worker
/// claim scan once their `query_at` has passed. Terminal states never
/// transition further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Deferred,
    Failed,
    Error,
    Inactive,
    Complete,
    Killed,
}

impl JobState {
    /// Every state, in display order.
    pub const ALL: [JobState; 8] = [
        JobState::Pending,
        JobState::Running,
        JobState::Deferred,
        JobState::Failed,
        JobState::Error,
        JobState::Inactive,
        JobState::Complete,
        JobState::Killed,
    ];

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Complete | JobState::Inactive | JobState::Error | JobState::Killed
        )
    }

    /// States a worker may claim from.
    pub fn is_claimable(&self) -> bool {
        matches!(
            self,
            JobState::Pending | JobState::Deferred | JobState::Failed
        )
    }

    /// Parse a lowercase state name.
    pub fn parse(s: &str) -> Option<JobState> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(JobState::Pending),
            "running" => Some(JobState::Running),
            "deferred" => Some(JobState::Deferred),
            "failed" => Some(JobState::Failed),
            "error" => Some(JobState::Error),
            "inactive" => Some(JobState::Inactive),
            "complete" => Some(JobState::Complete),
            "killed" => Some(JobState::Killed),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Deferred => "deferred",
            JobState::Failed => "failed",
            JobState::Error => "error",
            JobState::Inactive => "inactive",
            JobState::Complete => "complete",
            JobState::Killed => "killed",
        };
        write!(f, "{}", s)
    }
}

/// Who enqueued the job, and when (epoch ms).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enqueued {
    pub username: String,
    pub at: u64,
}

/// Mirror of the lock row kept on the job record while it is owned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub worker: String,
    pub acquired: u64,
    pub heartbeat: u64,
}

/// Mutual-exclusion row in the `lock` collection, keyed by job id.
///
/// Insert-if-absent on this row is the claim primitive; the owning worker
/// refreshes `heartbeat` on every observe tick so the orphan sweep can tell
/// a live owner from a dead one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub job_id: JobId,
    pub worker: String,
    pub acquired: u64,
    pub heartbeat: u64,
}

/// Latest progress report from job code, stamped by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Fraction complete in `[0, 1]`.
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub at: u64,
}

/// A job in the queue (or, after archival, the journal).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    /// Fully qualified registry name of the job implementation.
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    pub state: JobState,
    /// Lower runs first; ties broken by enqueue time.
    pub priority: i32,
    pub attempts: u32,
    pub attempts_left: u32,
    #[serde(default)]
    pub force: bool,
    pub enqueued: Enqueued,
    /// Epoch ms before which the job is not eligible for claiming.
    pub query_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<u64>,
    /// Seconds of execution accumulated across attempts.
    #[serde(default)]
    pub runtime: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<LockInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zombie_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub killed_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    /// Seconds to back off before the next attempt after a deferral/failure.
    pub defer_time: u64,
    /// Total deferral budget in seconds; a deferring job older than this goes
    /// inactive instead of deferred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defer_max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_time: Option<u64>,
    /// Seconds without progress after which the job is flagged as a zombie.
    pub zombie_time: u64,
    /// When set, a wall-time violation escalates from flag to kill.
    #[serde(default)]
    pub wall_kill: bool,
    /// Content hash over (name, args); duplicate detection key.
    pub fingerprint: String,
    /// Last failure message, kept for the detail view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Optimistic-concurrency revision; bumped by every store update.
    #[serde(default)]
    pub revision: u64,
}

impl JobRecord {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Project a job belongs to: the first dotted segment of its qual-name.
    pub fn project(&self) -> &str {
        self.name.split('.').next().unwrap_or(&self.name)
    }

    /// Four-character flag column: one uppercase letter per set flag
    /// (zombie, wall, removed, killed), `.` otherwise.
    pub fn flag_string(&self) -> String {
        [
            (self.zombie_at, 'Z'),
            (self.wall_at, 'W'),
            (self.removed_at, 'R'),
            (self.killed_at, 'K'),
        ]
        .iter()
        .map(|(at, c)| if at.is_some() { *c } else { '.' })
        .collect()
    }

    /// Runtime in seconds, live-adjusted while running.
    pub fn live_runtime(&self, now_ms: u64) -> f64 {
        match (self.state, self.started_at) {
            (JobState::Running, Some(started)) => {
                self.runtime + now_ms.saturating_sub(started) as f64 / 1000.0
            }
            _ => self.runtime,
        }
    }

    /// Attempts consumed so far. While running, the in-flight attempt counts
    /// as used even though `attempts_left` is only decremented on its
    /// terminal transition.
    pub fn attempts_used(&self) -> u32 {
        let used = self.attempts.saturating_sub(self.attempts_left);
        if self.state == JobState::Running {
            (used + 1).min(self.attempts)
        } else {
            used
        }
    }

    /// Timestamp zombie detection measures staleness from: the latest
    /// progress report, falling back to the attempt start.
    pub fn liveness_at(&self) -> Option<u64> {
        match (&self.progress, self.started_at) {
            (Some(p), Some(s)) => Some(p.at.max(s)),
            (Some(p), None) => Some(p.at),
            (None, s) => s,
        }
    }
}

/// Content fingerprint over the canonical form of `(name, args)`.
///
/// Top-level argument keys are order-insensitive, so they are serialized
/// through a sorted map before hashing. 256 bits of SHA-2 output keeps the
/// identity collision-resistant.
pub fn fingerprint(name: &str, args: &Map<String, Value>) -> String {
    let sorted: BTreeMap<&String, &Value> = args.iter().collect();
    let canonical =
        serde_json::to_string(&sorted).unwrap_or_else(|_| String::from("{}"));
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;

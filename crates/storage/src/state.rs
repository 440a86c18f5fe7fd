// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The store's document set and the operations both backends share.
//!
//! Collections: `queue` (non-terminal jobs), `journal` (archived terminal
//! jobs), `lock`, `daemon`, `stdout`, plus the maintenance and halt flag
//! documents. Keys are hex job ids / daemon identifiers; BTreeMaps keep
//! scans in id (= creation) order without a separate index.

use gantry_core::{DaemonRecord, JobId, JobRecord, JobState, LockRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::store::StoreError;

/// Maintenance gate flags: a global timestamp plus per-project timestamps.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceFlags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub projects: BTreeMap<String, u64>,
}

impl MaintenanceFlags {
    /// True when claiming is suspended for jobs of `project`.
    pub fn gates(&self, project: &str) -> bool {
        self.global.is_some() || self.projects.contains_key(project)
    }

    /// True when the global flag or any project flag is set.
    pub fn any(&self) -> bool {
        self.global.is_some() || !self.projects.is_empty()
    }
}

/// Full store document. Backends differ only in where this lives.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub queue: BTreeMap<String, JobRecord>,
    #[serde(default)]
    pub journal: BTreeMap<String, JobRecord>,
    #[serde(default)]
    pub locks: BTreeMap<String, LockRecord>,
    #[serde(default)]
    pub daemons: BTreeMap<String, DaemonRecord>,
    #[serde(default)]
    pub maintenance: MaintenanceFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halt: Option<u64>,
    #[serde(default)]
    pub stdout: BTreeMap<String, String>,
}

impl StoreState {
    pub fn insert_job(&mut self, job: &JobRecord) -> Result<(), StoreError> {
        let key = job.id.to_hex();
        if self.queue.contains_key(&key) || self.journal.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        self.queue.insert(key, job.clone());
        Ok(())
    }

    pub fn fetch_job(&self, id: &JobId) -> Result<JobRecord, StoreError> {
        let key = id.to_hex();
        self.queue
            .get(&key)
            .or_else(|| self.journal.get(&key))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    /// Revision CAS on the queue collection.
    pub fn update_job(&mut self, job: &JobRecord) -> Result<JobRecord, StoreError> {
        let key = job.id.to_hex();
        let current = self.queue.get_mut(&key).ok_or(StoreError::NotFound)?;
        if current.revision != job.revision {
            return Err(StoreError::Conflict);
        }
        let mut updated = job.clone();
        updated.revision += 1;
        *current = updated.clone();
        Ok(updated)
    }

    pub fn archive_job(&mut self, id: &JobId) -> Result<(), StoreError> {
        let key = id.to_hex();
        let job = self.queue.remove(&key).ok_or(StoreError::NotFound)?;
        self.journal.insert(key, job);
        Ok(())
    }

    pub fn runnable_jobs(&self, now_ms: u64) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self
            .queue
            .values()
            .filter(|j| {
                j.state.is_claimable()
                    && j.query_at <= now_ms
                    && j.removed_at.is_none()
                    && j.killed_at.is_none()
                    && !self.locks.contains_key(&j.id.to_hex())
            })
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            (a.priority, a.enqueued.at, a.id).cmp(&(b.priority, b.enqueued.at, b.id))
        });
        jobs
    }

    pub fn list_jobs(
        &self,
        states: Option<&[JobState]>,
        name: Option<&str>,
    ) -> Vec<JobRecord> {
        self.queue
            .values()
            .filter(|j| states.is_none_or(|s| s.contains(&j.state)))
            .filter(|j| name.is_none_or(|n| j.name == n))
            .cloned()
            .collect()
    }

    pub fn list_journal(&self, name: Option<&str>) -> Vec<JobRecord> {
        self.journal
            .values()
            .filter(|j| name.is_none_or(|n| j.name == n))
            .cloned()
            .collect()
    }

    pub fn find_active(&self, fingerprint: &str) -> Option<JobRecord> {
        self.queue
            .values()
            .find(|j| j.fingerprint == fingerprint && !j.state.is_terminal())
            .cloned()
    }

    pub fn find_by_prefix(&self, prefix: &str) -> Vec<JobRecord> {
        self.queue
            .values()
            .chain(self.journal.values())
            .filter(|j| j.id.matches_prefix(prefix))
            .cloned()
            .collect()
    }

    pub fn acquire_lock(&mut self, job_id: &JobId, worker: &str, now_ms: u64) -> bool {
        let key = job_id.to_hex();
        if self.locks.contains_key(&key) {
            return false;
        }
        self.locks.insert(
            key,
            LockRecord {
                job_id: *job_id,
                worker: worker.to_string(),
                acquired: now_ms,
                heartbeat: now_ms,
            },
        );
        true
    }

    pub fn release_lock(&mut self, job_id: &JobId) {
        self.locks.remove(&job_id.to_hex());
    }

    pub fn refresh_lock(
        &mut self,
        job_id: &JobId,
        worker: &str,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        let lock = self
            .locks
            .get_mut(&job_id.to_hex())
            .ok_or(StoreError::NotFound)?;
        if lock.worker != worker {
            return Err(StoreError::Conflict);
        }
        lock.heartbeat = now_ms;
        Ok(())
    }

    pub fn get_lock(&self, job_id: &JobId) -> Option<LockRecord> {
        self.locks.get(&job_id.to_hex()).cloned()
    }

    pub fn set_maintenance(&mut self, project: Option<&str>, now_ms: u64) {
        match project {
            Some(p) => {
                self.maintenance.projects.insert(p.to_string(), now_ms);
            }
            None => self.maintenance.global = Some(now_ms),
        }
    }

    pub fn clear_maintenance(&mut self, project: Option<&str>) {
        match project {
            Some(p) => {
                self.maintenance.projects.remove(p);
            }
            None => self.maintenance.global = None,
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;

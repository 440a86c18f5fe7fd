// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store: the test vehicle and single-process deployment backend.

use async_trait::async_trait;
use gantry_core::{DaemonRecord, JobId, JobRecord, JobState, LockRecord};
use parking_lot::Mutex;

use crate::state::{MaintenanceFlags, StoreState};
use crate::store::{Store, StoreError};

/// All collections behind one mutex; every operation is atomic by
/// construction.
#[derive(Default)]
pub struct MemStore {
    state: Mutex<StoreState>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the full document set (test assertions).
    pub fn snapshot(&self) -> StoreState {
        self.state.lock().clone()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn insert_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        self.state.lock().insert_job(job)
    }

    async fn fetch_job(&self, id: &JobId) -> Result<JobRecord, StoreError> {
        self.state.lock().fetch_job(id)
    }

    async fn update_job(&self, job: &JobRecord) -> Result<JobRecord, StoreError> {
        self.state.lock().update_job(job)
    }

    async fn archive_job(&self, id: &JobId) -> Result<(), StoreError> {
        self.state.lock().archive_job(id)
    }

    async fn runnable_jobs(&self, now_ms: u64) -> Result<Vec<JobRecord>, StoreError> {
        Ok(self.state.lock().runnable_jobs(now_ms))
    }

    async fn list_jobs(
        &self,
        states: Option<&[JobState]>,
        name: Option<&str>,
    ) -> Result<Vec<JobRecord>, StoreError> {
        Ok(self.state.lock().list_jobs(states, name))
    }

    async fn list_journal(&self, name: Option<&str>) -> Result<Vec<JobRecord>, StoreError> {
        Ok(self.state.lock().list_journal(name))
    }

    async fn find_active(&self, fingerprint: &str) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.state.lock().find_active(fingerprint))
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<JobRecord>, StoreError> {
        Ok(self.state.lock().find_by_prefix(prefix))
    }

    async fn acquire_lock(
        &self,
        job_id: &JobId,
        worker: &str,
        now_ms: u64,
    ) -> Result<bool, StoreError> {
        Ok(self.state.lock().acquire_lock(job_id, worker, now_ms))
    }

    async fn release_lock(&self, job_id: &JobId) -> Result<(), StoreError> {
        self.state.lock().release_lock(job_id);
        Ok(())
    }

    async fn refresh_lock(
        &self,
        job_id: &JobId,
        worker: &str,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        self.state.lock().refresh_lock(job_id, worker, now_ms)
    }

    async fn get_lock(&self, job_id: &JobId) -> Result<Option<LockRecord>, StoreError> {
        Ok(self.state.lock().get_lock(job_id))
    }

    async fn list_locks(&self) -> Result<Vec<LockRecord>, StoreError> {
        Ok(self.state.lock().locks.values().cloned().collect())
    }

    async fn upsert_daemon(&self, record: &DaemonRecord) -> Result<(), StoreError> {
        self.state
            .lock()
            .daemons
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn remove_daemon(&self, id: &str) -> Result<(), StoreError> {
        self.state.lock().daemons.remove(id);
        Ok(())
    }

    async fn list_daemons(&self) -> Result<Vec<DaemonRecord>, StoreError> {
        Ok(self.state.lock().daemons.values().cloned().collect())
    }

    async fn set_maintenance(
        &self,
        project: Option<&str>,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        self.state.lock().set_maintenance(project, now_ms);
        Ok(())
    }

    async fn clear_maintenance(&self, project: Option<&str>) -> Result<(), StoreError> {
        self.state.lock().clear_maintenance(project);
        Ok(())
    }

    async fn get_maintenance(&self) -> Result<MaintenanceFlags, StoreError> {
        Ok(self.state.lock().maintenance.clone())
    }

    async fn set_halt(&self, at_ms: u64) -> Result<(), StoreError> {
        self.state.lock().halt = Some(at_ms);
        Ok(())
    }

    async fn get_halt(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.state.lock().halt)
    }

    async fn write_stdout(&self, job_id: &JobId, text: &str) -> Result<(), StoreError> {
        self.state
            .lock()
            .stdout
            .insert(job_id.to_hex(), text.to_string());
        Ok(())
    }

    async fn read_stdout(&self, job_id: &JobId) -> Result<Option<String>, StoreError> {
        Ok(self.state.lock().stdout.get(&job_id.to_hex()).cloned())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

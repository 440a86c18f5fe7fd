// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed store: one JSON document shared by every process on a host.
//!
//! Every operation takes an fs2 file lock on a sidecar lock file (shared for
//! reads, exclusive for writes), so the read-modify-write of an atomic
//! update is serialized across processes. Writes go to a temp file and are
//! renamed into place; a crash mid-write leaves the previous document
//! intact.

use async_trait::async_trait;
use fs2::FileExt;
use gantry_core::{DaemonRecord, JobId, JobRecord, JobState, LockRecord};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::state::{MaintenanceFlags, StoreState};
use crate::store::{Store, StoreError};

pub struct FileStore {
    data_path: PathBuf,
    lock_path: PathBuf,
}

impl FileStore {
    /// Open (or initialize) the store document at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_path: PathBuf = path.into();
        if let Some(parent) = data_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut lock_name = data_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "store.json".into());
        lock_name.push(".lock");
        let lock_path = data_path.with_file_name(lock_name);
        Ok(Self {
            data_path,
            lock_path,
        })
    }

    fn lock_file(&self) -> Result<File, StoreError> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?)
    }

    fn load(&self) -> Result<StoreState, StoreError> {
        match std::fs::read(&self.data_path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                tracing::warn!(path = %self.data_path.display(), error = %e, "store document corrupt");
                StoreError::Corrupt(format!("{}: {}", self.data_path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreState::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, state: &StoreState) -> Result<(), StoreError> {
        let tmp = self.data_path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(state)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.data_path)?;
        Ok(())
    }

    /// Read-only operation under a shared lock.
    fn read_op<R>(
        &self,
        f: impl FnOnce(&StoreState) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let guard = self.lock_file()?;
        guard.lock_shared()?;
        let result = self.load().and_then(|state| f(&state));
        let _ = FileExt::unlock(&guard);
        result
    }

    /// Read-modify-write operation under an exclusive lock.
    fn write_op<R>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let guard = self.lock_file()?;
        guard.lock_exclusive()?;
        let result = (|| {
            let mut state = self.load()?;
            let value = f(&mut state)?;
            self.save(&state)?;
            Ok(value)
        })();
        let _ = FileExt::unlock(&guard);
        result
    }

    pub fn path(&self) -> &Path {
        &self.data_path
    }
}

#[async_trait]
impl Store for FileStore {
    async fn insert_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        self.write_op(|s| s.insert_job(job))
    }

    async fn fetch_job(&self, id: &JobId) -> Result<JobRecord, StoreError> {
        self.read_op(|s| s.fetch_job(id))
    }

    async fn update_job(&self, job: &JobRecord) -> Result<JobRecord, StoreError> {
        self.write_op(|s| s.update_job(job))
    }

    async fn archive_job(&self, id: &JobId) -> Result<(), StoreError> {
        self.write_op(|s| s.archive_job(id))
    }

    async fn runnable_jobs(&self, now_ms: u64) -> Result<Vec<JobRecord>, StoreError> {
        self.read_op(|s| Ok(s.runnable_jobs(now_ms)))
    }

    async fn list_jobs(
        &self,
        states: Option<&[JobState]>,
        name: Option<&str>,
    ) -> Result<Vec<JobRecord>, StoreError> {
        self.read_op(|s| Ok(s.list_jobs(states, name)))
    }

    async fn list_journal(&self, name: Option<&str>) -> Result<Vec<JobRecord>, StoreError> {
        self.read_op(|s| Ok(s.list_journal(name)))
    }

    async fn find_active(&self, fingerprint: &str) -> Result<Option<JobRecord>, StoreError> {
        self.read_op(|s| Ok(s.find_active(fingerprint)))
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<JobRecord>, StoreError> {
        self.read_op(|s| Ok(s.find_by_prefix(prefix)))
    }

    async fn acquire_lock(
        &self,
        job_id: &JobId,
        worker: &str,
        now_ms: u64,
    ) -> Result<bool, StoreError> {
        self.write_op(|s| Ok(s.acquire_lock(job_id, worker, now_ms)))
    }

    async fn release_lock(&self, job_id: &JobId) -> Result<(), StoreError> {
        self.write_op(|s| {
            s.release_lock(job_id);
            Ok(())
        })
    }

    async fn refresh_lock(
        &self,
        job_id: &JobId,
        worker: &str,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        self.write_op(|s| s.refresh_lock(job_id, worker, now_ms))
    }

    async fn get_lock(&self, job_id: &JobId) -> Result<Option<LockRecord>, StoreError> {
        self.read_op(|s| Ok(s.get_lock(job_id)))
    }

    async fn list_locks(&self) -> Result<Vec<LockRecord>, StoreError> {
        self.read_op(|s| Ok(s.locks.values().cloned().collect()))
    }

    async fn upsert_daemon(&self, record: &DaemonRecord) -> Result<(), StoreError> {
        self.write_op(|s| {
            s.daemons.insert(record.id.clone(), record.clone());
            Ok(())
        })
    }

    async fn remove_daemon(&self, id: &str) -> Result<(), StoreError> {
        self.write_op(|s| {
            s.daemons.remove(id);
            Ok(())
        })
    }

    async fn list_daemons(&self) -> Result<Vec<DaemonRecord>, StoreError> {
        self.read_op(|s| Ok(s.daemons.values().cloned().collect()))
    }

    async fn set_maintenance(
        &self,
        project: Option<&str>,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        self.write_op(|s| {
            s.set_maintenance(project, now_ms);
            Ok(())
        })
    }

    async fn clear_maintenance(&self, project: Option<&str>) -> Result<(), StoreError> {
        self.write_op(|s| {
            s.clear_maintenance(project);
            Ok(())
        })
    }

    async fn get_maintenance(&self) -> Result<MaintenanceFlags, StoreError> {
        self.read_op(|s| Ok(s.maintenance.clone()))
    }

    async fn set_halt(&self, at_ms: u64) -> Result<(), StoreError> {
        self.write_op(|s| {
            s.halt = Some(at_ms);
            Ok(())
        })
    }

    async fn get_halt(&self) -> Result<Option<u64>, StoreError> {
        self.read_op(|s| Ok(s.halt))
    }

    async fn write_stdout(&self, job_id: &JobId, text: &str) -> Result<(), StoreError> {
        self.write_op(|s| {
            s.stdout.insert(job_id.to_hex(), text.to_string());
            Ok(())
        })
    }

    async fn read_stdout(&self, job_id: &JobId) -> Result<Option<String>, StoreError> {
        self.read_op(|s| Ok(s.stdout.get(&job_id.to_hex()).cloned()))
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;

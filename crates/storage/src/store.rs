// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store adapter trait and error kinds.

use async_trait::async_trait;
use gantry_core::{DaemonRecord, JobId, JobRecord, JobState, LockRecord};

use crate::state::MaintenanceFlags;

/// Store failures. `Conflict` (an atomic condition failed) is transient and
/// retried on the caller's next tick; it is deliberately distinct from
/// `NotFound`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("atomic condition failed")]
    Conflict,

    #[error("no matching record")]
    NotFound,

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store document corrupt: {0}")]
    Corrupt(String),
}

/// The coordination store.
///
/// Required primitives per the platform design: insert-if-absent (locks),
/// atomic find-and-modify (job transitions, revision-guarded), sorted
/// filtered scans (the claim query), and a wall clock usable for heartbeat
/// comparison.
#[async_trait]
pub trait Store: Send + Sync {
    // --- jobs: queue and journal ---

    /// Insert a new job into the queue. `Conflict` if the id exists.
    async fn insert_job(&self, job: &JobRecord) -> Result<(), StoreError>;

    /// Fetch by id, queue first, then journal.
    async fn fetch_job(&self, id: &JobId) -> Result<JobRecord, StoreError>;

    /// Revision-guarded find-and-modify: replaces the stored record iff its
    /// revision still matches `job.revision`, then bumps the revision.
    /// Returns the stored record. `Conflict` on mismatch.
    async fn update_job(&self, job: &JobRecord) -> Result<JobRecord, StoreError>;

    /// Move a job from the queue to the journal.
    async fn archive_job(&self, id: &JobId) -> Result<(), StoreError>;

    /// Claim candidates: claimable state, `query_at <= now`, unlocked, not
    /// removed — sorted by `(priority, enqueued.at, id)`.
    async fn runnable_jobs(&self, now_ms: u64) -> Result<Vec<JobRecord>, StoreError>;

    /// Queue scan with optional state and name filters, in id order.
    async fn list_jobs(
        &self,
        states: Option<&[JobState]>,
        name: Option<&str>,
    ) -> Result<Vec<JobRecord>, StoreError>;

    /// Journal scan with optional name filter, in id order.
    async fn list_journal(&self, name: Option<&str>) -> Result<Vec<JobRecord>, StoreError>;

    /// Queue lookup by content fingerprint, non-terminal records only.
    async fn find_active(&self, fingerprint: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Queue+journal lookup by hex id prefix.
    async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<JobRecord>, StoreError>;

    // --- locks ---

    /// Insert-if-absent on the lock row: the mutual-exclusion primitive.
    /// Returns false when another holder exists.
    async fn acquire_lock(
        &self,
        job_id: &JobId,
        worker: &str,
        now_ms: u64,
    ) -> Result<bool, StoreError>;

    /// Remove a lock row. Idempotent.
    async fn release_lock(&self, job_id: &JobId) -> Result<(), StoreError>;

    /// Refresh the lock heartbeat. `NotFound` if absent, `Conflict` if held
    /// by a different worker.
    async fn refresh_lock(
        &self,
        job_id: &JobId,
        worker: &str,
        now_ms: u64,
    ) -> Result<(), StoreError>;

    async fn get_lock(&self, job_id: &JobId) -> Result<Option<LockRecord>, StoreError>;

    async fn list_locks(&self) -> Result<Vec<LockRecord>, StoreError>;

    // --- daemon registry ---

    async fn upsert_daemon(&self, record: &DaemonRecord) -> Result<(), StoreError>;

    /// Remove a daemon row. Idempotent.
    async fn remove_daemon(&self, id: &str) -> Result<(), StoreError>;

    async fn list_daemons(&self) -> Result<Vec<DaemonRecord>, StoreError>;

    // --- maintenance and halt flags ---

    async fn set_maintenance(
        &self,
        project: Option<&str>,
        now_ms: u64,
    ) -> Result<(), StoreError>;

    async fn clear_maintenance(&self, project: Option<&str>) -> Result<(), StoreError>;

    async fn get_maintenance(&self) -> Result<MaintenanceFlags, StoreError>;

    async fn set_halt(&self, at_ms: u64) -> Result<(), StoreError>;

    async fn get_halt(&self) -> Result<Option<u64>, StoreError>;

    // --- stdout log ---

    async fn write_stdout(&self, job_id: &JobId, text: &str) -> Result<(), StoreError>;

    async fn read_stdout(&self, job_id: &JobId) -> Result<Option<String>, StoreError>;
}

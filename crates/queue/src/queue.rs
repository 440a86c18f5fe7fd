// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue service: enqueue, claim, lifecycle transitions, and admin flows.
//!
//! Every mutation goes through the store's revision-guarded update; a
//! `Conflict` means another daemon got there first and the caller retries
//! on its next tick. Transitions for one job are additionally serialized by
//! the lock row, so conflicts only occur between a job's owner and the
//! administrative flag setters (kill/remove).

use std::collections::BTreeMap;
use std::sync::Arc;

use gantry_core::job::fingerprint;
use gantry_core::{
    Clock, Context, DaemonRecord, Enqueued, JobId, JobRecord, JobState, LockInfo, Progress,
    Registry, Runnable, SystemClock,
};
use gantry_storage::Store;
use serde_json::{Map, Value};

use crate::error::QueueError;

/// Attempts at a revision-guarded update before giving up on this tick.
const UPDATE_RETRIES: usize = 3;

/// Overrides accepted at enqueue time; anything unset comes from the
/// registered job spec.
#[derive(Debug, Default, Clone)]
pub struct EnqueueOptions {
    pub priority: Option<i32>,
    pub attempts: Option<u32>,
    pub force: bool,
}

/// One row of the `--info` rollup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStateRow {
    pub n: usize,
    pub state: JobState,
    pub flags: String,
    pub name: String,
}

/// The queue service. Cheap to clone; all clones share the store handle.
pub struct Queue<C: Clock = SystemClock> {
    store: Arc<dyn Store>,
    registry: Arc<Registry>,
    clock: C,
    ctx: Context,
}

impl<C: Clock> Clone for Queue<C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            clock: self.clock.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

impl<C: Clock> std::fmt::Debug for Queue<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue").field("ctx", &self.ctx).finish()
    }
}

impl<C: Clock> Queue<C> {
    pub fn new(store: Arc<dyn Store>, registry: Arc<Registry>, clock: C, ctx: Context) -> Self {
        Self {
            store,
            registry,
            clock,
            ctx,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }

    // --- enqueue and lookup ---

    /// Validate, fill defaults, and persist a new PENDING job.
    pub async fn enqueue(
        &self,
        name: &str,
        args: Map<String, Value>,
        opts: EnqueueOptions,
    ) -> Result<JobRecord, QueueError> {
        let spec = self.registry.get(name)?;
        let print = fingerprint(name, &args);

        if !opts.force {
            if let Some(existing) = self.store.find_active(&print).await? {
                return Err(QueueError::Duplicate {
                    name: name.to_string(),
                    existing: existing.id,
                });
            }
        }

        let now = self.now_ms();
        let attempts = opts.attempts.unwrap_or(spec.attempts).max(1);
        let job = JobRecord {
            id: JobId::generate(now),
            name: name.to_string(),
            fingerprint: print,
            args,
            state: JobState::Pending,
            priority: opts.priority.unwrap_or(spec.priority),
            attempts,
            attempts_left: attempts,
            force: opts.force,
            enqueued: Enqueued {
                username: self.ctx.config.username.clone(),
                at: now,
            },
            query_at: now,
            started_at: None,
            finished_at: None,
            runtime: 0.0,
            locked: None,
            zombie_at: None,
            wall_at: None,
            removed_at: None,
            killed_at: None,
            progress: None,
            schedule: spec.schedule.clone(),
            defer_time: spec.defer_time,
            defer_max: spec.defer_max,
            wall_time: spec.wall_time,
            zombie_time: spec.zombie_time,
            wall_kill: spec.wall_kill,
            error: None,
            revision: 0,
        };
        self.store.insert_job(&job).await?;
        tracing::info!(job_id = %job.id, name, priority = job.priority, "enqueued");
        Ok(job)
    }

    /// Fetch a job and materialize its registered implementation.
    pub async fn load_job(
        &self,
        id: &JobId,
    ) -> Result<(JobRecord, Box<dyn Runnable>), QueueError> {
        let job = self.store.fetch_job(id).await?;
        let spec = self.registry.get(&job.name)?;
        Ok((job, spec.instantiate()))
    }

    pub async fn job_detail(&self, id: &JobId) -> Result<JobRecord, QueueError> {
        Ok(self.store.fetch_job(id).await?)
    }

    pub async fn get_job_stdout(&self, id: &JobId) -> Result<Option<String>, QueueError> {
        Ok(self.store.read_stdout(id).await?)
    }

    // --- locking ---

    /// Atomic test-and-set on the lock row. True when this call acquired it.
    pub async fn lock_job(&self, id: &JobId, worker: &str) -> Result<bool, QueueError> {
        Ok(self.store.acquire_lock(id, worker, self.now_ms()).await?)
    }

    /// Remove the lock row. Idempotent.
    pub async fn unlock_job(&self, id: &JobId) -> Result<(), QueueError> {
        Ok(self.store.release_lock(id).await?)
    }

    // --- claim ---

    /// Claim one runnable job for `worker`: scan candidates in
    /// `(priority, enqueued.at)` order, take the lock, then transition to
    /// RUNNING. Returns None when nothing is claimable.
    pub async fn claim(&self, worker: &str) -> Result<Option<JobRecord>, QueueError> {
        let now = self.now_ms();
        let flags = self.store.get_maintenance().await?;
        let candidates = self.store.runnable_jobs(now).await?;

        for candidate in candidates {
            if !candidate.force && flags.gates(candidate.project()) {
                continue;
            }
            if !self.lock_job(&candidate.id, worker).await? {
                continue;
            }
            match self.start_claimed(&candidate.id, worker, now).await {
                Ok(job) => {
                    tracing::info!(
                        job_id = %job.id,
                        name = %job.name,
                        worker,
                        "claimed"
                    );
                    return Ok(Some(job));
                }
                Err(QueueError::Conflict) | Err(QueueError::NotFound) => {
                    // Lost the race after taking the lock; hand it back and
                    // move to the next candidate.
                    self.unlock_job(&candidate.id).await?;
                }
                Err(e) => {
                    self.unlock_job(&candidate.id).await?;
                    return Err(e);
                }
            }
        }
        Ok(None)
    }

    /// The RUNNING transition for a freshly locked job.
    async fn start_claimed(
        &self,
        id: &JobId,
        worker: &str,
        now: u64,
    ) -> Result<JobRecord, QueueError> {
        let attempt_on_claim = self.ctx.config.attempt_on_claim;
        let worker = worker.to_string();
        let job = self.store.fetch_job(id).await?;
        if !job.state.is_claimable() || job.removed_at.is_some() || job.killed_at.is_some() {
            return Err(QueueError::Conflict);
        }
        let mut next = job;
        next.state = JobState::Running;
        next.started_at = Some(now);
        next.locked = Some(LockInfo {
            worker,
            acquired: now,
            heartbeat: now,
        });
        next.force = false;
        next.error = None;
        next.progress = None;
        if attempt_on_claim {
            next.attempts_left = next.attempts_left.saturating_sub(1);
        }
        Ok(self.store.update_job(&next).await?)
    }

    // --- terminal transitions ---

    async fn apply_with_retry<F>(&self, id: &JobId, f: F) -> Result<JobRecord, QueueError>
    where
        F: Fn(&mut JobRecord) -> Result<(), QueueError>,
    {
        for _ in 0..UPDATE_RETRIES {
            let mut job = self.store.fetch_job(id).await?;
            f(&mut job)?;
            match self.store.update_job(&job).await {
                Ok(updated) => return Ok(updated),
                Err(gantry_storage::StoreError::Conflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(QueueError::Conflict)
    }

    /// Stamp the end of the current attempt. Runtime only accumulates for
    /// an attempt that actually ran; `started_at` alone is not enough, a
    /// FAILED job keeps the previous attempt's start.
    fn finish_attempt(job: &mut JobRecord, now: u64) {
        if job.state == JobState::Running {
            if let Some(started) = job.started_at {
                job.runtime += now.saturating_sub(started) as f64 / 1000.0;
            }
        }
        job.locked = None;
    }

    /// Successful return from user code.
    pub async fn set_complete(&self, id: &JobId) -> Result<JobRecord, QueueError> {
        let now = self.now_ms();
        let attempt_on_claim = self.ctx.config.attempt_on_claim;
        let job = self
            .apply_with_retry(id, |job| {
                Self::finish_attempt(job, now);
                if !attempt_on_claim {
                    job.attempts_left = job.attempts_left.saturating_sub(1);
                }
                job.state = JobState::Complete;
                job.finished_at = Some(now);
                Ok(())
            })
            .await?;
        self.store.archive_job(id).await?;
        tracing::info!(job_id = %id, runtime = job.runtime, "complete");
        Ok(job)
    }

    /// Deferral requested by job code: back off without consuming an
    /// attempt. A job past its total deferral budget goes INACTIVE instead.
    pub async fn set_defer(
        &self,
        id: &JobId,
        reason: Option<String>,
    ) -> Result<JobRecord, QueueError> {
        let now = self.now_ms();
        let job = self
            .apply_with_retry(id, |job| {
                Self::finish_attempt(job, now);
                job.error = reason.clone();
                let exhausted = job
                    .defer_max
                    .is_some_and(|max| now >= job.enqueued.at + max * 1_000);
                if exhausted {
                    job.state = JobState::Inactive;
                    job.finished_at = Some(now);
                } else {
                    job.state = JobState::Deferred;
                    job.query_at = now + job.defer_time * 1_000;
                }
                Ok(())
            })
            .await?;
        if job.state == JobState::Inactive {
            self.store.archive_job(id).await?;
            tracing::info!(job_id = %id, "deferral budget exhausted, now inactive");
        } else {
            tracing::info!(job_id = %id, query_at = job.query_at, "deferred");
        }
        Ok(job)
    }

    /// Failure from user code (or on behalf of a dirty executor exit):
    /// consume an attempt, retry with backoff while attempts remain, else
    /// the terminal ERROR state.
    pub async fn set_failed(
        &self,
        id: &JobId,
        error: impl Into<String>,
    ) -> Result<JobRecord, QueueError> {
        let now = self.now_ms();
        let attempt_on_claim = self.ctx.config.attempt_on_claim;
        let error = error.into();
        let job = self
            .apply_with_retry(id, |job| {
                Self::finish_attempt(job, now);
                if !attempt_on_claim {
                    job.attempts_left = job.attempts_left.saturating_sub(1);
                }
                job.error = Some(error.clone());
                if job.attempts_left > 0 {
                    job.state = JobState::Failed;
                    job.query_at = now + job.defer_time * 1_000;
                } else {
                    job.state = JobState::Error;
                    job.finished_at = Some(now);
                }
                Ok(())
            })
            .await?;
        if job.state == JobState::Error {
            self.store.archive_job(id).await?;
            tracing::warn!(job_id = %id, error = %error, "failed terminally");
        } else {
            tracing::warn!(
                job_id = %id,
                error = %error,
                attempts_left = job.attempts_left,
                "failed, will retry"
            );
        }
        Ok(job)
    }

    /// Kill transition applied by the owning worker after terminating the
    /// child.
    pub async fn set_killed(&self, id: &JobId) -> Result<JobRecord, QueueError> {
        let now = self.now_ms();
        let job = self
            .apply_with_retry(id, |job| {
                Self::finish_attempt(job, now);
                job.state = JobState::Killed;
                job.finished_at = Some(now);
                if job.killed_at.is_none() {
                    job.killed_at = Some(now);
                }
                Ok(())
            })
            .await?;
        self.store.archive_job(id).await?;
        tracing::info!(job_id = %id, "killed");
        Ok(job)
    }

    // --- administrative flows ---

    /// Flag a job for removal. Idle jobs are archived immediately; a RUNNING
    /// job is terminated and archived by its owning worker at the next
    /// observe tick.
    pub async fn remove_job(&self, id: &JobId) -> Result<(), QueueError> {
        let now = self.now_ms();
        let job = self.store.fetch_job(id).await?;
        if job.is_terminal() {
            // Archived already; removing again is a no-op.
            return Ok(());
        }
        let updated = self
            .apply_with_retry(id, |job| {
                if job.removed_at.is_none() {
                    job.removed_at = Some(now);
                }
                Ok(())
            })
            .await?;
        if updated.state != JobState::Running {
            self.store.archive_job(id).await?;
        }
        tracing::info!(job_id = %id, state = %updated.state, "removal flagged");
        Ok(())
    }

    /// Archive the current record and enqueue a fresh instance of the same
    /// (name, args). Rejected while RUNNING and for KILLED jobs.
    pub async fn restart_job(&self, id: &JobId) -> Result<JobId, QueueError> {
        let job = self.store.fetch_job(id).await?;
        match job.state {
            JobState::Running => return Err(QueueError::Conflict),
            JobState::Killed => {
                return Err(QueueError::Usage(
                    "killed jobs cannot be restarted".to_string(),
                ))
            }
            _ => {}
        }

        if !job.is_terminal() {
            let now = self.now_ms();
            self.apply_with_retry(id, |job| {
                if job.removed_at.is_none() {
                    job.removed_at = Some(now);
                }
                Ok(())
            })
            .await?;
            self.store.archive_job(id).await?;
        }

        let fresh = self
            .enqueue(
                &job.name,
                job.args.clone(),
                EnqueueOptions {
                    priority: Some(job.priority),
                    attempts: Some(job.attempts),
                    force: false,
                },
            )
            .await?;
        tracing::info!(old = %id, new = %fresh.id, "restarted");
        Ok(fresh.id)
    }

    /// Mark a non-terminal job `killed_at`. Idle jobs (PENDING, DEFERRED,
    /// FAILED) have no child to wait on and transition to KILLED + archive
    /// here; a RUNNING job's owning worker terminates the child at its next
    /// observe tick. Killing a terminal job is a no-op.
    pub async fn kill_job(&self, id: &JobId) -> Result<(), QueueError> {
        let now = self.now_ms();
        let job = self.store.fetch_job(id).await?;
        if job.is_terminal() {
            // Archived already; nothing left to kill.
            return Ok(());
        }
        let updated = self
            .apply_with_retry(id, |job| {
                if job.killed_at.is_none() {
                    job.killed_at = Some(now);
                }
                Ok(())
            })
            .await?;
        if updated.state == JobState::Running {
            tracing::info!(job_id = %id, "kill flagged");
        } else {
            self.set_killed(id).await?;
        }
        Ok(())
    }

    /// Advisory wall-time violation flag, set by the owning worker.
    pub async fn flag_wall(&self, id: &JobId) -> Result<(), QueueError> {
        let now = self.now_ms();
        self.apply_with_retry(id, |job| {
            if job.wall_at.is_none() {
                job.wall_at = Some(now);
            }
            Ok(())
        })
        .await?;
        tracing::warn!(job_id = %id, "wall time exceeded");
        Ok(())
    }

    /// Advisory zombie flag for a job with stale progress. The owning worker
    /// stays responsible for the child.
    pub async fn flag_zombie(&self, id: &JobId) -> Result<(), QueueError> {
        let now = self.now_ms();
        self.apply_with_retry(id, |job| {
            if job.zombie_at.is_none() {
                job.zombie_at = Some(now);
            }
            Ok(())
        })
        .await?;
        tracing::warn!(job_id = %id, "zombie flagged");
        Ok(())
    }

    // --- progress ---

    /// Persist a progress report from job code; doubles as the liveness
    /// signal zombie detection watches.
    pub async fn update_progress(
        &self,
        id: &JobId,
        value: f64,
        message: Option<&str>,
    ) -> Result<(), QueueError> {
        let now = self.now_ms();
        let message = message.map(String::from);
        self.apply_with_retry(id, |job| {
            job.progress = Some(Progress {
                value: value.clamp(0.0, 1.0),
                message: message.clone(),
                at: now,
            });
            Ok(())
        })
        .await?;
        Ok(())
    }

    // --- maintenance and halt ---

    /// Is maintenance active? With a project, checks that project's flag or
    /// the global one; without, checks the global flag.
    pub async fn maintenance(&self, project: Option<&str>) -> Result<bool, QueueError> {
        let flags = self.store.get_maintenance().await?;
        Ok(match project {
            Some(p) => flags.gates(p),
            None => flags.global.is_some(),
        })
    }

    /// Projects currently flagged for maintenance.
    pub async fn maintenance_projects(&self) -> Result<Vec<String>, QueueError> {
        let flags = self.store.get_maintenance().await?;
        Ok(flags.projects.keys().cloned().collect())
    }

    pub async fn enter_maintenance(&self, project: Option<&str>) -> Result<(), QueueError> {
        self.store
            .set_maintenance(project, self.now_ms())
            .await?;
        tracing::info!(project = project.unwrap_or("*"), "maintenance entered");
        Ok(())
    }

    pub async fn leave_maintenance(&self, project: Option<&str>) -> Result<(), QueueError> {
        self.store.clear_maintenance(project).await?;
        tracing::info!(project = project.unwrap_or("*"), "maintenance left");
        Ok(())
    }

    /// Set the global halt flag. Daemons whose start predates the flag stop
    /// at their next tick; daemons started afterwards run normally.
    pub async fn halt(&self) -> Result<u64, QueueError> {
        let now = self.now_ms();
        self.store.set_halt(now).await?;
        tracing::warn!(at = now, "halt flagged");
        Ok(now)
    }

    pub async fn get_halt(&self) -> Result<Option<u64>, QueueError> {
        Ok(self.store.get_halt().await?)
    }

    // --- read-only rollups ---

    /// Daemon registry, sorted by identifier.
    pub async fn get_daemon(&self) -> Result<Vec<DaemonRecord>, QueueError> {
        let mut daemons = self.store.list_daemons().await?;
        daemons.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(daemons)
    }

    /// Counts grouped by (state, flags, name), sorted for stable output.
    pub async fn get_queue_state(&self) -> Result<Vec<QueueStateRow>, QueueError> {
        let jobs = self.store.list_jobs(None, None).await?;
        let mut groups: BTreeMap<(String, String, String), usize> = BTreeMap::new();
        for job in &jobs {
            *groups
                .entry((job.state.to_string(), job.flag_string(), job.name.clone()))
                .or_insert(0) += 1;
        }
        Ok(groups
            .into_iter()
            .filter_map(|((state, flags, name), n)| {
                JobState::parse(&state).map(|state| QueueStateRow {
                    n,
                    state,
                    flags,
                    name,
                })
            })
            .collect())
    }

    /// Queue listing with optional state/name filters, in creation order.
    pub async fn get_job_listing(
        &self,
        states: Option<&[JobState]>,
        name: Option<&str>,
    ) -> Result<Vec<JobRecord>, QueueError> {
        let mut jobs = self.store.list_jobs(states, name).await?;
        jobs.sort_by_key(|j| j.id);
        Ok(jobs)
    }

    /// Resolve a CLI token to concrete job ids: a full or unambiguous hex id
    /// prefix, or a qual-name fanned out to every matching non-terminal job.
    pub async fn resolve_targets(&self, token: &str) -> Result<Vec<JobId>, QueueError> {
        if let Some(id) = JobId::parse(token) {
            return Ok(vec![id]);
        }

        if token.len() >= 6 && token.chars().all(|c| c.is_ascii_hexdigit()) {
            let matches = self.store.find_by_prefix(token).await?;
            if !matches.is_empty() {
                return Ok(matches.into_iter().map(|j| j.id).collect());
            }
        }

        let jobs = self.store.list_jobs(None, Some(token)).await?;
        let ids: Vec<JobId> = jobs
            .iter()
            .filter(|j| !j.is_terminal())
            .map(|j| j.id)
            .collect();
        if ids.is_empty() {
            return Err(QueueError::NotFound);
        }
        Ok(ids)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

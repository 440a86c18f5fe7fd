// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker daemon: heartbeat, observe, reap, claim, spawn.
//!
//! The loop is single-threaded and cooperative; parallelism comes from the
//! executor children, one per concurrency slot. Transient store errors are
//! logged and retried on the next tick; only a store outage beyond the
//! configured grace period (or a failed startup) terminates the daemon.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gantry_core::{Clock, DaemonKind, JobId, JobState};
use gantry_queue::{Queue, QueueError};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, warn};

use crate::error::DaemonError;
use crate::lifecycle::DaemonHandle;
use crate::spawn::{ExecExit, ExecHandle, ExecSpawner};

pub struct Worker<C: Clock + 'static> {
    queue: Queue<C>,
    lifecycle: DaemonHandle<C>,
    spawner: Arc<dyn ExecSpawner>,
    children: HashMap<JobId, Box<dyn ExecHandle>>,
    concurrency: usize,
    stopping: bool,
    store_failing_since: Option<u64>,
}

impl<C: Clock + 'static> Worker<C> {
    /// Register the daemon record and build the loop state. The queue
    /// context's identifier names this worker in locks and logs.
    pub async fn new(
        queue: Queue<C>,
        spawner: Arc<dyn ExecSpawner>,
    ) -> Result<Self, DaemonError> {
        let concurrency = queue.context().config.concurrency.max(1);
        let lifecycle = DaemonHandle::register(queue.clone(), DaemonKind::Worker).await?;
        Ok(Self {
            queue,
            lifecycle,
            spawner,
            children: HashMap::new(),
            concurrency,
            stopping: false,
            store_failing_since: None,
        })
    }

    pub fn identifier(&self) -> &str {
        self.lifecycle.identifier()
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    pub fn active_children(&self) -> usize {
        self.children.len()
    }

    /// Main loop: tick until halted (or signalled) and all children are
    /// reaped, then deregister.
    pub async fn run(mut self) -> Result<(), DaemonError> {
        let period = Duration::from_millis(self.queue.context().config.worker_tick_ms.max(100));
        let mut interval = tokio::time::interval(period);
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        info!(worker = %self.identifier(), concurrency = self.concurrency, "worker running");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await?;
                    if self.stopping && self.children.is_empty() {
                        break;
                    }
                }
                _ = sigterm.recv() => self.begin_stop("SIGTERM").await,
                _ = sigint.recv() => self.begin_stop("SIGINT").await,
            }
        }
        self.lifecycle.deregister().await
    }

    async fn begin_stop(&mut self, why: &str) {
        if !self.stopping {
            info!(worker = %self.identifier(), why, "shutdown requested");
            self.stopping = true;
            if let Err(e) = self.lifecycle.stopping().await {
                warn!(error = %e, "failed to record stopping phase");
            }
        }
    }

    /// One loop tick. Public so tests can drive the loop deterministically.
    pub async fn tick(&mut self) -> Result<(), DaemonError> {
        // The heartbeat is the mandatory store touch; it carries the
        // outage-grace accounting for the whole tick.
        match self.lifecycle.beat().await {
            Ok(()) => self.store_failing_since = None,
            Err(e) => return self.track_store_failure(e),
        }

        if !self.stopping {
            match self.lifecycle.halted().await {
                Ok(true) => self.begin_stop("halt flag").await,
                Ok(false) => {}
                Err(e) => warn!(error = %e, "halt check failed"),
            }
        }

        self.observe().await;
        self.sweep().await;

        if !self.stopping {
            self.claim_spare().await;
        }
        Ok(())
    }

    fn track_store_failure(&mut self, e: DaemonError) -> Result<(), DaemonError> {
        let now = self.queue.now_ms();
        let since = *self.store_failing_since.get_or_insert(now);
        let grace = self.queue.context().config.store_grace_secs;
        if now.saturating_sub(since) > grace * 1_000 {
            error!(error = %e, grace_secs = grace, "store unreachable beyond grace period");
            return Err(DaemonError::StoreGone(grace));
        }
        warn!(error = %e, "store unreachable, retrying next tick");
        Ok(())
    }

    /// Observe owned jobs: refresh lock heartbeats, honour administrative
    /// flags, enforce wall time, and reap exited children.
    async fn observe(&mut self) {
        let now = self.queue.now_ms();
        let worker_id = self.identifier().to_string();
        let ids: Vec<JobId> = self.children.keys().copied().collect();

        for id in ids {
            if let Err(e) = self.queue.store().refresh_lock(&id, &worker_id, now).await {
                debug!(job_id = %id, error = %e, "lock heartbeat refresh failed");
            }

            let job = match self.queue.job_detail(&id).await {
                Ok(job) => job,
                Err(e) => {
                    warn!(job_id = %id, error = %e, "cannot observe job");
                    continue;
                }
            };

            if job.state == JobState::Running {
                if job.killed_at.is_some() || job.removed_at.is_some() {
                    self.terminate_child(&id).await;
                    continue;
                }

                if let (Some(wall), Some(started)) = (job.wall_time, job.started_at) {
                    if job.wall_at.is_none() && now.saturating_sub(started) > wall * 1_000 {
                        if let Err(e) = self.queue.flag_wall(&id).await {
                            warn!(job_id = %id, error = %e, "wall flag failed");
                        }
                        if job.wall_kill {
                            if let Err(e) = self.queue.kill_job(&id).await {
                                warn!(job_id = %id, error = %e, "wall kill failed");
                            }
                            self.terminate_child(&id).await;
                            continue;
                        }
                    }
                }
            }

            let exit = match self.children.get_mut(&id) {
                Some(child) => match child.poll().await {
                    Ok(exit) => exit,
                    Err(e) => {
                        warn!(job_id = %id, error = %e, "child poll failed");
                        None
                    }
                },
                None => None,
            };
            if let Some(exit) = exit {
                self.reap(&id, exit).await;
            }
        }
    }

    /// Kill the child for an administratively terminated job, then apply
    /// the KILLED transition and release the lock.
    async fn terminate_child(&mut self, id: &JobId) {
        if let Some(mut child) = self.children.remove(id) {
            if let Err(e) = child.kill().await {
                warn!(job_id = %id, error = %e, "child kill failed");
            }
            if let Ok(Some(exit)) = child.poll().await {
                self.record_stdout(id, &exit).await;
            }
        }
        if let Err(e) = self.queue.set_killed(id).await {
            warn!(job_id = %id, error = %e, "kill transition failed");
        }
        if let Err(e) = self.queue.unlock_job(id).await {
            warn!(job_id = %id, error = %e, "unlock failed");
        }
    }

    /// Post-exit bookkeeping: capture stdout, fail dirty exits on the
    /// child's behalf, release the lock.
    async fn reap(&mut self, id: &JobId, exit: ExecExit) {
        self.children.remove(id);
        self.record_stdout(id, &exit).await;

        match self.queue.job_detail(id).await {
            // A child that exited without writing a terminal state failed.
            Ok(job) if job.state == JobState::Running => {
                let reason = match exit.code {
                    Some(code) => format!("executor exited with code {}", code),
                    None => "executor killed before reporting".to_string(),
                };
                info!(job_id = %id, reason = %reason, "dirty exit, failing on behalf of child");
                if let Err(e) = self.queue.set_failed(id, reason).await {
                    warn!(job_id = %id, error = %e, "on-behalf failure transition failed");
                }
            }
            Ok(job) => {
                debug!(job_id = %id, state = %job.state, code = ?exit.code, "child reaped");
            }
            Err(QueueError::NotFound) => {
                debug!(job_id = %id, "job gone at reap time");
            }
            Err(e) => {
                warn!(job_id = %id, error = %e, "reap lookup failed");
            }
        }

        if let Err(e) = self.queue.unlock_job(id).await {
            warn!(job_id = %id, error = %e, "unlock failed");
        }
    }

    async fn record_stdout(&self, id: &JobId, exit: &ExecExit) {
        if exit.output.is_empty() {
            return;
        }
        if let Err(e) = self.queue.store().write_stdout(id, &exit.output).await {
            warn!(job_id = %id, error = %e, "stdout capture failed");
        }
    }

    /// Zombie pass: flag RUNNING jobs with stale progress, and expire locks
    /// whose owning daemon has disappeared.
    async fn sweep(&mut self) {
        let now = self.queue.now_ms();

        match self
            .queue
            .get_job_listing(Some(&[JobState::Running]), None)
            .await
        {
            Ok(running) => {
                for job in &running {
                    let stale = job
                        .liveness_at()
                        .is_some_and(|at| now.saturating_sub(at) > job.zombie_time * 1_000);
                    if job.zombie_at.is_none() && stale {
                        if let Err(e) = self.queue.flag_zombie(&job.id).await {
                            warn!(job_id = %job.id, error = %e, "zombie flag failed");
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "zombie scan failed"),
        }

        let (locks, daemons) = match (
            self.queue.store().list_locks().await,
            self.queue.store().list_daemons().await,
        ) {
            (Ok(locks), Ok(daemons)) => (locks, daemons),
            _ => return,
        };

        for lock in locks {
            if lock.worker == self.identifier() {
                continue;
            }
            let job = match self.queue.job_detail(&lock.job_id).await {
                Ok(job) if job.state == JobState::Running => job,
                _ => continue,
            };
            let stale_ms = job.zombie_time * 1_000;
            let owner_alive = daemons
                .iter()
                .any(|d| d.id == lock.worker && now.saturating_sub(d.heartbeat) <= stale_ms);
            if owner_alive {
                continue;
            }

            warn!(
                job_id = %job.id,
                owner = %lock.worker,
                "expiring lock of vanished worker"
            );
            if let Err(e) = self.queue.unlock_job(&job.id).await {
                warn!(job_id = %job.id, error = %e, "orphan unlock failed");
                continue;
            }
            if let Err(e) = self
                .queue
                .set_failed(&job.id, format!("lost by worker {}", lock.worker))
                .await
            {
                warn!(job_id = %job.id, error = %e, "orphan failure transition failed");
            }
        }
    }

    /// Fill spare concurrency slots from the claim scan.
    async fn claim_spare(&mut self) {
        while self.children.len() < self.concurrency {
            let worker_id = self.identifier().to_string();
            let job = match self.queue.claim(&worker_id).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "claim failed");
                    break;
                }
            };
            match self.spawner.spawn(&job).await {
                Ok(child) => {
                    self.children.insert(job.id, child);
                }
                Err(e) => {
                    error!(job_id = %job.id, error = %e, "executor spawn failed");
                    if let Err(e) = self
                        .queue
                        .set_failed(&job.id, format!("spawn failed: {}", e))
                        .await
                    {
                        warn!(job_id = %job.id, error = %e, "spawn failure transition failed");
                    }
                    if let Err(e) = self.queue.unlock_job(&job.id).await {
                        warn!(job_id = %job.id, error = %e, "unlock failed");
                    }
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler daemon: enqueue jobs when their cron expressions fire.
//!
//! The evaluation window is `(last_eval, now]`; daemon start seeds the
//! first window, and downtime longer than a schedule's period collapses to
//! a single enqueue per class (missed boundaries are coalesced). A class
//! with a live non-terminal instance is skipped.

use std::time::Duration;

use gantry_core::{Clock, DaemonKind};
use gantry_queue::cron::{self, Schedule};
use gantry_queue::{EnqueueOptions, Queue, QueueError};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info, warn};

use crate::error::DaemonError;
use crate::lifecycle::DaemonHandle;

pub struct Scheduler<C: Clock + 'static> {
    queue: Queue<C>,
    lifecycle: DaemonHandle<C>,
    schedules: Vec<(String, Schedule)>,
    last_eval: u64,
    stopping: bool,
}

impl<C: Clock + 'static> std::fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("queue", &self.queue)
            .field("lifecycle", &self.lifecycle)
            .field("last_eval", &self.last_eval)
            .field("stopping", &self.stopping)
            .finish()
    }
}

impl<C: Clock + 'static> Scheduler<C> {
    /// Parse every registered schedule and register the daemon record.
    /// An unparsable expression is a setup error: fail fast, not per-tick.
    pub async fn new(queue: Queue<C>) -> Result<Self, DaemonError> {
        let mut schedules = Vec::new();
        for spec in queue.registry().scheduled() {
            let Some(expr) = &spec.schedule else { continue };
            let schedule = cron::parse_schedule(expr)
                .map_err(|e| DaemonError::Setup(format!("{}: {}", spec.name, e)))?;
            schedules.push((spec.name.clone(), schedule));
        }

        let lifecycle = DaemonHandle::register(queue.clone(), DaemonKind::Scheduler).await?;
        let last_eval = queue.now_ms();
        info!(
            scheduler = %lifecycle.identifier(),
            classes = schedules.len(),
            "scheduler running"
        );
        Ok(Self {
            queue,
            lifecycle,
            schedules,
            last_eval,
            stopping: false,
        })
    }

    pub fn identifier(&self) -> &str {
        self.lifecycle.identifier()
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    pub async fn run(mut self) -> Result<(), DaemonError> {
        let period =
            Duration::from_millis(self.queue.context().config.scheduler_tick_ms.max(500));
        let mut interval = tokio::time::interval(period);
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await?;
                    if self.stopping {
                        break;
                    }
                }
                _ = sigterm.recv() => { self.stopping = true; }
                _ = sigint.recv() => { self.stopping = true; }
            }
        }
        self.lifecycle.deregister().await
    }

    /// One evaluation tick. Public so tests can drive it deterministically.
    pub async fn tick(&mut self) -> Result<(), DaemonError> {
        if let Err(e) = self.lifecycle.beat().await {
            warn!(error = %e, "store unreachable, retrying next tick");
            return Ok(());
        }

        match self.lifecycle.halted().await {
            Ok(true) => {
                self.stopping = true;
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "halt check failed"),
        }

        let now = self.queue.now_ms();
        for (name, schedule) in &self.schedules {
            if !cron::due_between(schedule, self.last_eval, now) {
                continue;
            }
            match self
                .queue
                .enqueue(name, serde_json::Map::new(), EnqueueOptions::default())
                .await
            {
                Ok(job) => {
                    info!(job_id = %job.id, name = %name, "scheduled enqueue");
                }
                // A live instance with the default args coalesces the fire.
                Err(QueueError::Duplicate { existing, .. }) => {
                    debug!(name = %name, existing = %existing, "coalesced: instance active");
                }
                Err(e) => {
                    warn!(name = %name, error = %e, "scheduled enqueue failed");
                }
            }
        }
        self.last_eval = now;
        Ok(())
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: registry record, heartbeat, halt observation.
//!
//! Every daemon keeps one row in the store's `daemon` collection alive for
//! as long as it runs. The row is the fleet's liveness source: `--alive`
//! lists it, the zombie sweep compares lock owners against it, and removal
//! on clean exit is what halt convergence observes.

use gantry_core::{local_hostname, Clock, DaemonKind, DaemonPhase, DaemonRecord};
use gantry_queue::Queue;
use tracing::{info, warn};

use crate::error::DaemonError;

/// A registered daemon's handle on its own registry row.
pub struct DaemonHandle<C: Clock> {
    queue: Queue<C>,
    record: DaemonRecord,
}

impl<C: Clock> std::fmt::Debug for DaemonHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonHandle")
            .field("queue", &self.queue)
            .field("record", &self.record)
            .finish()
    }
}

impl<C: Clock> DaemonHandle<C> {
    /// Register this process in the daemon collection. The queue context's
    /// identifier becomes the row id.
    pub async fn register(queue: Queue<C>, kind: DaemonKind) -> Result<Self, DaemonError> {
        let identifier = queue.context().identifier.clone();
        let record = DaemonRecord::new(identifier, kind, local_hostname(), queue.now_ms());
        queue.store().upsert_daemon(&record).await.map_err(|e| DaemonError::Queue(e.into()))?;
        info!(daemon = %record.id, kind = %kind, pid = record.pid, "daemon registered");
        Ok(Self { queue, record })
    }

    pub fn identifier(&self) -> &str {
        &self.record.id
    }

    pub fn phase(&self) -> DaemonPhase {
        self.record.phase
    }

    /// Per-tick bookkeeping: bump the loop counter and refresh heartbeat.
    pub async fn beat(&mut self) -> Result<(), DaemonError> {
        self.record.beat(self.queue.now_ms());
        if self.record.phase == DaemonPhase::Starting {
            self.record.phase = DaemonPhase::Running;
        }
        self.queue
            .store()
            .upsert_daemon(&self.record)
            .await
            .map_err(|e| DaemonError::Queue(e.into()))?;
        Ok(())
    }

    /// Whether the global halt flag applies to this daemon: set, and not
    /// older than our own start (daemons started after a halt run normally).
    pub async fn halted(&self) -> Result<bool, DaemonError> {
        Ok(self
            .queue
            .get_halt()
            .await?
            .is_some_and(|at| at >= self.record.started_at))
    }

    /// Enter the STOPPING phase (stop taking on new work).
    pub async fn stopping(&mut self) -> Result<(), DaemonError> {
        if self.record.phase != DaemonPhase::Stopping {
            info!(daemon = %self.record.id, "stopping");
            self.record.phase = DaemonPhase::Stopping;
            self.queue
                .store()
                .upsert_daemon(&self.record)
                .await
                .map_err(|e| DaemonError::Queue(e.into()))?;
        }
        Ok(())
    }

    /// Remove the registry row on clean exit.
    pub async fn deregister(self) -> Result<(), DaemonError> {
        if let Err(e) = self.queue.store().remove_daemon(&self.record.id).await {
            warn!(daemon = %self.record.id, error = %e, "failed to remove daemon record");
        }
        info!(daemon = %self.record.id, "daemon deregistered");
        Ok(())
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

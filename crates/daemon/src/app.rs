// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! App daemon shell: the API server's registry presence.
//!
//! The HTTP surface lives outside this crate; the shell keeps a daemon
//! record alive so `--alive` sees the fleet's app processes and halt
//! convergence covers all daemon kinds.

use std::time::Duration;

use gantry_core::{Clock, DaemonKind};
use gantry_queue::Queue;
use tokio::signal::unix::{signal, SignalKind};
use tracing::warn;

use crate::error::DaemonError;
use crate::lifecycle::DaemonHandle;

pub struct AppDaemon<C: Clock + 'static> {
    queue: Queue<C>,
    lifecycle: DaemonHandle<C>,
    stopping: bool,
}

impl<C: Clock + 'static> AppDaemon<C> {
    pub async fn new(queue: Queue<C>) -> Result<Self, DaemonError> {
        let lifecycle = DaemonHandle::register(queue.clone(), DaemonKind::App).await?;
        Ok(Self {
            queue,
            lifecycle,
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
            Duration::from_millis(self.queue.context().config.worker_tick_ms.max(100));
        let mut interval = tokio::time::interval(period);
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
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

    pub async fn tick(&mut self) {
        if let Err(e) = self.lifecycle.beat().await {
            warn!(error = %e, "store unreachable, retrying next tick");
            return;
        }
        match self.lifecycle.halted().await {
            Ok(true) => self.stopping = true,
            Ok(false) => {}
            Err(e) => warn!(error = %e, "halt check failed"),
        }
    }
}

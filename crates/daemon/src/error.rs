// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon error kinds.

use gantry_queue::QueueError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    /// Startup-time misconfiguration; the daemon refuses to start.
    #[error("setup error: {0}")]
    Setup(String),

    /// The store stayed unreachable past the configured grace period.
    #[error("store unreachable for {0}s, giving up")]
    StoreGone(u64),

    #[error("failed to spawn executor: {0}")]
    Spawn(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue service error kinds.

use gantry_core::{JobId, RegistryError};
use gantry_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Configuration or class resolution failed; fatal for the caller.
    #[error("setup error: {0}")]
    Setup(String),

    /// CLI or API misuse.
    #[error("{0}")]
    Usage(String),

    /// No job, daemon, or record matches.
    #[error("no matching record")]
    NotFound,

    /// A store atomic condition failed; transient, retried on the next tick.
    #[error("conflicting concurrent update")]
    Conflict,

    /// Enqueue would create a second non-terminal instance of (name, args).
    #[error("duplicate job: {name} already enqueued as [{existing}]")]
    Duplicate { name: String, existing: JobId },

    /// Store I/O or corruption.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for QueueError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => QueueError::Conflict,
            StoreError::NotFound => QueueError::NotFound,
            other => QueueError::Store(other),
        }
    }
}

impl From<RegistryError> for QueueError {
    fn from(e: RegistryError) -> Self {
        QueueError::Setup(e.to_string())
    }
}

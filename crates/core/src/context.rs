// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Explicit execution context threaded through daemons, queue, and executor.
//!
//! Replaces ambient per-object state: the identifier names the acting
//! process (daemon identifier or job id) in log lines and lock rows, the
//! config carries resolved settings. Logging itself is ambient via
//! `tracing`'s subscriber.

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct Context {
    /// Identity of the acting process, e.g. `host:worker:alpha`.
    pub identifier: String,
    pub config: Config,
}

impl Context {
    pub fn new(identifier: impl Into<String>, config: Config) -> Self {
        Self {
            identifier: identifier.into(),
            config,
        }
    }
}

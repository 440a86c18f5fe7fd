// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gantry-core: Job model, daemon records, registry, and ambient plumbing
//! shared by every gantry crate.

pub mod clock;
pub mod config;
pub mod context;
pub mod daemon;
pub mod id;
pub mod job;
pub mod registry;
pub mod time_fmt;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{Config, ConfigError};
pub use context::Context;
pub use daemon::{daemon_identifier, local_hostname, DaemonKind, DaemonPhase, DaemonRecord};
pub use id::JobId;
pub use job::{Enqueued, JobRecord, JobState, LockInfo, LockRecord, Progress};
pub use registry::{
    JobContext, JobError, JobSpec, Registry, RegistryError, Runnable, DEFAULT_ATTEMPTS,
    DEFAULT_DEFER_MAX_SECS, DEFAULT_DEFER_TIME_SECS, DEFAULT_PRIORITY, DEFAULT_ZOMBIE_TIME_SECS,
};
pub use time_fmt::{format_elapsed, format_elapsed_ms, format_timestamp};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

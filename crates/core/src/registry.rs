// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job implementation registry.
//!
//! Implementations are compiled in and registered under their canonical
//! qual-name at daemon startup; `load_job` is a registry lookup rather than
//! dynamic class loading. The spec a class registers with also supplies the
//! enqueue defaults (priority, attempts, backoff) and the scheduler's cron
//! expression.

use crate::id::JobId;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

/// Default maximum attempts for a job class.
pub const DEFAULT_ATTEMPTS: u32 = 1;
/// Default priority (lower runs first).
pub const DEFAULT_PRIORITY: i32 = 0;
/// Default backoff before re-attempting a deferred or failed job.
pub const DEFAULT_DEFER_TIME_SECS: u64 = 300;
/// Default total deferral budget before a job goes inactive.
pub const DEFAULT_DEFER_MAX_SECS: u64 = 3_600;
/// Default progress-staleness threshold for zombie flagging.
pub const DEFAULT_ZOMBIE_TIME_SECS: u64 = 1_800;

/// Signalled by job code to end the current attempt.
#[derive(Debug, Error)]
pub enum JobError {
    /// Re-schedule after the job's defer backoff without consuming an attempt.
    #[error("job deferred{}", fmt_reason(.0))]
    Deferred(Option<String>),
    /// Any other failure; consumes an attempt.
    #[error("job failed: {0}")]
    Failed(String),
}

fn fmt_reason(reason: &Option<String>) -> String {
    match reason {
        Some(r) => format!(": {}", r),
        None => String::new(),
    }
}

impl JobError {
    pub fn failed(msg: impl Into<String>) -> Self {
        JobError::Failed(msg.into())
    }

    pub fn deferred(msg: impl Into<String>) -> Self {
        JobError::Deferred(Some(msg.into()))
    }
}

/// Execution context handed to job code by the executor.
///
/// Carries the enqueue arguments and a progress sink; progress reports are
/// persisted by the executor and double as the liveness signal zombie
/// detection watches.
pub struct JobContext<'a> {
    pub id: JobId,
    pub args: &'a Map<String, Value>,
    progress: Box<dyn FnMut(f64, Option<&str>) + Send + 'a>,
}

impl<'a> JobContext<'a> {
    pub fn new(
        id: JobId,
        args: &'a Map<String, Value>,
        progress: Box<dyn FnMut(f64, Option<&str>) + Send + 'a>,
    ) -> Self {
        Self { id, args, progress }
    }

    /// Look up an argument by name.
    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }

    /// Look up an argument, failing the attempt when missing.
    pub fn require_arg(&self, key: &str) -> Result<&Value, JobError> {
        self.args
            .get(key)
            .ok_or_else(|| JobError::Failed(format!("missing argument: {}", key)))
    }

    /// Report progress in `[0, 1]` with an optional message.
    pub fn progress(&mut self, value: f64, message: Option<&str>) {
        (self.progress)(value.clamp(0.0, 1.0), message);
    }
}

/// A unit of user code runnable by the executor.
pub trait Runnable: Send {
    fn run(&self, ctx: &mut JobContext<'_>) -> Result<(), JobError>;
}

type Factory = Box<dyn Fn() -> Box<dyn Runnable> + Send + Sync>;

/// Registration record for one job class: factory plus enqueue defaults.
pub struct JobSpec {
    pub name: String,
    factory: Factory,
    pub schedule: Option<String>,
    pub priority: i32,
    pub attempts: u32,
    pub defer_time: u64,
    pub defer_max: Option<u64>,
    pub wall_time: Option<u64>,
    pub zombie_time: u64,
    pub wall_kill: bool,
}

impl std::fmt::Debug for JobSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSpec")
            .field("name", &self.name)
            .field("schedule", &self.schedule)
            .field("priority", &self.priority)
            .field("attempts", &self.attempts)
            .field("defer_time", &self.defer_time)
            .field("defer_max", &self.defer_max)
            .field("wall_time", &self.wall_time)
            .field("zombie_time", &self.zombie_time)
            .field("wall_kill", &self.wall_kill)
            .finish()
    }
}

impl JobSpec {
    pub fn new(
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn Runnable> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            factory: Box::new(factory),
            schedule: None,
            priority: DEFAULT_PRIORITY,
            attempts: DEFAULT_ATTEMPTS,
            defer_time: DEFAULT_DEFER_TIME_SECS,
            defer_max: Some(DEFAULT_DEFER_MAX_SECS),
            wall_time: None,
            zombie_time: DEFAULT_ZOMBIE_TIME_SECS,
            wall_kill: false,
        }
    }

    pub fn with_schedule(mut self, expr: impl Into<String>) -> Self {
        self.schedule = Some(expr.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_defer_time(mut self, secs: u64) -> Self {
        self.defer_time = secs;
        self
    }

    pub fn with_defer_max(mut self, secs: Option<u64>) -> Self {
        self.defer_max = secs;
        self
    }

    pub fn with_wall_time(mut self, secs: u64) -> Self {
        self.wall_time = Some(secs);
        self
    }

    pub fn with_wall_kill(mut self, kill: bool) -> Self {
        self.wall_kill = kill;
        self
    }

    pub fn with_zombie_time(mut self, secs: u64) -> Self {
        self.zombie_time = secs;
        self
    }

    /// Build a fresh instance of the job implementation.
    pub fn instantiate(&self) -> Box<dyn Runnable> {
        (self.factory)()
    }
}

/// Registry errors are setup failures: they indicate a misconfigured binary,
/// not a transient condition.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("job class already registered: {0}")]
    Duplicate(String),
    #[error("unknown job class: {0}")]
    Unknown(String),
}

/// Maps qual-names to job specs.
#[derive(Default, Debug)]
pub struct Registry {
    specs: HashMap<String, JobSpec>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: JobSpec) -> Result<(), RegistryError> {
        if self.specs.contains_key(&spec.name) {
            return Err(RegistryError::Duplicate(spec.name));
        }
        self.specs.insert(spec.name.clone(), spec);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&JobSpec, RegistryError> {
        self.specs
            .get(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    /// All registered specs, sorted by name for stable iteration.
    pub fn specs(&self) -> Vec<&JobSpec> {
        let mut all: Vec<&JobSpec> = self.specs.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Specs declaring a cron schedule (the scheduler's working set).
    pub fn scheduled(&self) -> Vec<&JobSpec> {
        self.specs()
            .into_iter()
            .filter(|s| s.schedule.is_some())
            .collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for daemon crate tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gantry_core::{
    Config, Context, FakeClock, JobContext, JobError, JobSpec, Registry, Runnable,
};
use gantry_queue::Queue;
use gantry_storage::MemStore;

pub struct OkJob;

impl Runnable for OkJob {
    fn run(&self, _ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        Ok(())
    }
}

pub struct FailJob;

impl Runnable for FailJob {
    fn run(&self, _ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        Err(JobError::failed("nope"))
    }
}

/// Sleeps `ms` (default 1000) in small chunks, then completes.
pub struct SleepJob;

impl Runnable for SleepJob {
    fn run(&self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        let total = ctx
            .arg("ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(1_000);
        let mut slept = 0;
        while slept < total {
            let chunk = 50.min(total - slept);
            std::thread::sleep(Duration::from_millis(chunk));
            slept += chunk;
        }
        Ok(())
    }
}

pub fn test_registry() -> Registry {
    let mut registry = Registry::new();
    let specs = [
        JobSpec::new("demo.jobs.Ok", || Box::new(OkJob)).with_defer_time(1),
        JobSpec::new("demo.jobs.Fail", || Box::new(FailJob)).with_defer_time(1),
        JobSpec::new("demo.jobs.Sleep", || Box::new(SleepJob)),
        JobSpec::new("demo.jobs.SleepWalled", || Box::new(SleepJob))
            .with_wall_time(1)
            .with_wall_kill(true),
        JobSpec::new("demo.jobs.SleepZombie", || Box::new(SleepJob)).with_zombie_time(1),
        JobSpec::new("demo.jobs.Minutely", || Box::new(OkJob)).with_schedule("* * * * *"),
    ];
    for spec in specs {
        if let Err(e) = registry.register(spec) {
            unreachable!("test registry misconfigured: {}", e);
        }
    }
    registry
}

pub fn test_queue(identifier: &str) -> (Queue<FakeClock>, Arc<MemStore>, FakeClock) {
    queue_with_registry(identifier, test_registry())
}

pub fn queue_with_registry(
    identifier: &str,
    registry: Registry,
) -> (Queue<FakeClock>, Arc<MemStore>, FakeClock) {
    let store = Arc::new(MemStore::new());
    let clock = FakeClock::new();
    let mut config = Config::for_state_dir(PathBuf::from("/tmp/gantry-daemon-test"));
    config.concurrency = 2;
    let queue = Queue::new(
        Arc::clone(&store) as Arc<dyn gantry_storage::Store>,
        Arc::new(registry),
        clock.clone(),
        Context::new(identifier, config),
    );
    (queue, store, clock)
}

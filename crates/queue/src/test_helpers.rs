// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for queue crate tests.

use std::path::PathBuf;
use std::sync::Arc;

use gantry_core::{
    Config, Context, FakeClock, JobContext, JobError, JobSpec, Registry, Runnable,
};
use gantry_storage::MemStore;

use crate::queue::Queue;

pub struct OkJob;

impl Runnable for OkJob {
    fn run(&self, _ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        Ok(())
    }
}

pub struct DeferJob;

impl Runnable for DeferJob {
    fn run(&self, _ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        Err(JobError::deferred("not ready"))
    }
}

pub struct FailJob;

impl Runnable for FailJob {
    fn run(&self, _ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        Err(JobError::failed("exploded"))
    }
}

pub struct ProgressJob;

impl Runnable for ProgressJob {
    fn run(&self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        ctx.progress(0.5, Some("halfway"));
        Ok(())
    }
}

pub fn test_registry() -> Registry {
    let mut registry = Registry::new();
    let specs = [
        JobSpec::new("acme.jobs.Ok", || Box::new(OkJob)).with_defer_time(1),
        JobSpec::new("acme.jobs.Defer", || Box::new(DeferJob))
            .with_attempts(3)
            .with_defer_time(1),
        JobSpec::new("acme.jobs.Fail", || Box::new(FailJob))
            .with_attempts(2)
            .with_defer_time(1),
        JobSpec::new("acme.jobs.Progress", || Box::new(ProgressJob)),
        JobSpec::new("acme.jobs.Nightly", || Box::new(OkJob)).with_schedule("0 3 * * *"),
    ];
    for spec in specs {
        if let Err(e) = registry.register(spec) {
            unreachable!("test registry misconfigured: {}", e);
        }
    }
    registry
}

pub fn test_queue() -> (Queue<FakeClock>, Arc<MemStore>, FakeClock) {
    let store = Arc::new(MemStore::new());
    let clock = FakeClock::new();
    let config = Config::for_state_dir(PathBuf::from("/tmp/gantry-test-state"));
    let queue = Queue::new(
        Arc::clone(&store) as Arc<dyn gantry_storage::Store>,
        Arc::new(test_registry()),
        clock.clone(),
        Context::new("testhost:worker:t", config),
    );
    (queue, store, clock)
}

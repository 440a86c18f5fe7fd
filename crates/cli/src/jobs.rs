// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in job classes shipped with the binary.
//!
//! Deployments embed their own job implementations by registering specs
//! next to these; the bundled classes exercise the queue end to end and
//! give `--enqueue` something to chew on out of the box.

use std::time::Duration;

use gantry_core::{JobContext, JobError, JobSpec, Registry, RegistryError, Runnable};

/// Sleeps for the optional `sleep` seconds argument, reporting progress,
/// then completes.
pub struct DummyJob;

impl Runnable for DummyJob {
    fn run(&self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        let secs = ctx.arg("sleep").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let steps = (secs * 10.0).ceil() as u64;
        for step in 0..steps {
            std::thread::sleep(Duration::from_millis(100));
            ctx.progress((step + 1) as f64 / steps as f64, None);
        }
        Ok(())
    }
}

/// Defers until the `until` epoch-seconds argument has passed. A worked
/// example of the deferral protocol.
pub struct WaitJob;

impl Runnable for WaitJob {
    fn run(&self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        let until = ctx
            .require_arg("until")?
            .as_u64()
            .ok_or_else(|| JobError::failed("until must be epoch seconds"))?;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        if now < until {
            return Err(JobError::deferred(format!("waiting until {}", until)));
        }
        Ok(())
    }
}

/// Register the bundled classes.
pub fn register_builtin(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        JobSpec::new("gantry.jobs.DummyJob", || Box::new(DummyJob))
            .with_attempts(3)
            .with_defer_time(60),
    )?;
    registry.register(
        JobSpec::new("gantry.jobs.WaitJob", || Box::new(WaitJob))
            .with_attempts(10)
            .with_defer_time(30),
    )?;
    Ok(())
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-shot job executor.
//!
//! Runs inside an isolated child process (or an inline task under the test
//! spawner): load the job, drop privilege, run user code, report the
//! terminal state. The lock is released and privilege restored on every
//! exit path. The executor never polls; the owning worker observes its
//! termination.

use gantry_core::{Clock, JobContext, JobError, JobId};

use crate::error::QueueError;
use crate::queue::Queue;

/// Load and run one job to its terminal transition.
pub async fn run_job<C: Clock + 'static>(queue: &Queue<C>, id: JobId) -> Result<(), QueueError> {
    let (job, runnable) = queue.load_job(&id).await?;
    tracing::info!(job_id = %id, name = %job.name, "executor starting");

    drop_privilege();
    let outcome = run_user_code(queue, id, job.args.clone(), runnable).await;
    let result = report_outcome(queue, &id, outcome).await;
    restore_privilege();

    // The worker took the lock at claim time; give it back no matter how
    // the attempt ended.
    let unlocked = queue.unlock_job(&id).await;
    result?;
    unlocked
}

async fn run_user_code<C: Clock + 'static>(
    queue: &Queue<C>,
    id: JobId,
    args: serde_json::Map<String, serde_json::Value>,
    runnable: Box<dyn gantry_core::Runnable>,
) -> Result<(), JobError> {
    let progress_queue = queue.clone();
    let handle = tokio::runtime::Handle::current();

    let joined = tokio::task::spawn_blocking(move || {
        let mut ctx = JobContext::new(
            id,
            &args,
            Box::new(move |value, message| {
                if let Err(e) =
                    handle.block_on(progress_queue.update_progress(&id, value, message))
                {
                    tracing::warn!(job_id = %id, error = %e, "progress update failed");
                }
            }),
        );
        runnable.run(&mut ctx)
    })
    .await;

    match joined {
        Ok(result) => result,
        Err(e) => Err(JobError::Failed(format!("job code panicked: {}", e))),
    }
}

async fn report_outcome<C: Clock + 'static>(
    queue: &Queue<C>,
    id: &JobId,
    outcome: Result<(), JobError>,
) -> Result<(), QueueError> {
    match outcome {
        Ok(()) => {
            queue.set_complete(id).await?;
        }
        Err(JobError::Deferred(reason)) => {
            queue.set_defer(id, reason).await?;
        }
        Err(JobError::Failed(message)) => {
            queue.set_failed(id, message).await?;
        }
    }
    Ok(())
}

/// Privilege hooks around user code. Kept as explicit seams; daemons run
/// unprivileged by default so both are no-ops beyond a trace line.
fn drop_privilege() {
    tracing::debug!("privilege drop (no-op)");
}

fn restore_privilege() {
    tracing::debug!("privilege restore (no-op)");
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;

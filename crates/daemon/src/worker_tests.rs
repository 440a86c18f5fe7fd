// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::spawn::{ExecExit, ExecHandle, ExecSpawner, InlineSpawner};
use crate::test_helpers::{test_queue, queue_with_registry, test_registry};
use async_trait::async_trait;
use gantry_core::test_support::job_record;
use gantry_core::{FakeClock, LockInfo};
use gantry_queue::EnqueueOptions;
use serde_json::{json, Map};

const WORKER: &str = "host:worker:w1";

async fn worker_with_inline(
    queue: &Queue<FakeClock>,
) -> Worker<FakeClock> {
    let spawner = Arc::new(InlineSpawner::new(queue.clone()));
    Worker::new(queue.clone(), spawner).await.unwrap()
}

/// Tick the worker until it has reaped everything or the budget runs out.
async fn drain(worker: &mut Worker<FakeClock>) {
    for _ in 0..200 {
        worker.tick().await.unwrap();
        if worker.active_children() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("worker never drained its children");
}

#[tokio::test(flavor = "multi_thread")]
async fn claims_spawns_and_reaps_to_complete() {
    let (queue, store, _) = test_queue(WORKER);
    let mut worker = worker_with_inline(&queue).await;

    let job = queue
        .enqueue("demo.jobs.Ok", Map::new(), EnqueueOptions::default())
        .await
        .unwrap();

    worker.tick().await.unwrap();
    assert_eq!(worker.active_children(), 1);
    drain(&mut worker).await;

    let snap = store.snapshot();
    let done = snap.journal[&job.id.to_hex()].clone();
    assert_eq!(done.state, JobState::Complete);
    assert_eq!(done.attempts_left, done.attempts - 1);
    assert!(snap.locks.is_empty());
    assert!(snap.queue.is_empty());
    // The daemon record has been heartbeating.
    assert!(snap.daemons[WORKER].loop_count > 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn respects_concurrency_limit() {
    let (queue, _, _) = test_queue(WORKER);
    let mut worker = worker_with_inline(&queue).await;

    for i in 0..4 {
        let mut args = Map::new();
        args.insert("ms".to_string(), json!(300));
        args.insert("n".to_string(), json!(i));
        queue
            .enqueue("demo.jobs.Sleep", args, EnqueueOptions::default())
            .await
            .unwrap();
    }

    worker.tick().await.unwrap();
    // Config in the fixtures caps concurrency at 2.
    assert_eq!(worker.active_children(), 2);
    drain(&mut worker).await;
}

struct DirtySpawner;

struct DirtyHandle {
    polled: bool,
}

#[async_trait]
impl ExecHandle for DirtyHandle {
    async fn poll(&mut self) -> Result<Option<ExecExit>, DaemonError> {
        if self.polled {
            return Ok(None);
        }
        self.polled = true;
        Ok(Some(ExecExit {
            code: Some(7),
            output: "crash dump\n".to_string(),
        }))
    }

    async fn kill(&mut self) -> Result<(), DaemonError> {
        Ok(())
    }
}

#[async_trait]
impl ExecSpawner for DirtySpawner {
    async fn spawn(&self, _job: &gantry_core::JobRecord) -> Result<Box<dyn ExecHandle>, DaemonError> {
        Ok(Box::new(DirtyHandle { polled: false }))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn dirty_exit_is_failed_on_behalf_with_stdout_captured() {
    let (queue, store, _) = test_queue(WORKER);
    let spawner = Arc::new(DirtySpawner);
    let mut worker = Worker::new(queue.clone(), spawner).await.unwrap();

    let job = queue
        .enqueue("demo.jobs.Ok", Map::new(), EnqueueOptions::default())
        .await
        .unwrap();

    worker.tick().await.unwrap(); // claim + spawn
    worker.tick().await.unwrap(); // observe exit, fail on behalf

    let snap = store.snapshot();
    // Default attempts = 1, so the dirty exit is terminal.
    let failed = snap.journal[&job.id.to_hex()].clone();
    assert_eq!(failed.state, JobState::Error);
    assert!(failed.error.as_deref().is_some_and(|e| e.contains("code 7")));
    assert_eq!(snap.stdout[&job.id.to_hex()], "crash dump\n");
    assert!(snap.locks.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn kill_flag_terminates_child_within_a_tick() {
    let (queue, store, _) = test_queue(WORKER);
    let mut worker = worker_with_inline(&queue).await;

    let mut args = Map::new();
    args.insert("ms".to_string(), json!(2_000));
    let job = queue
        .enqueue("demo.jobs.Sleep", args, EnqueueOptions::default())
        .await
        .unwrap();

    worker.tick().await.unwrap();
    assert_eq!(worker.active_children(), 1);

    queue.kill_job(&job.id).await.unwrap();
    worker.tick().await.unwrap();

    let snap = store.snapshot();
    let killed = snap.journal[&job.id.to_hex()].clone();
    assert_eq!(killed.state, JobState::Killed);
    assert!(killed.killed_at.is_some());
    assert!(snap.locks.is_empty());
    assert_eq!(worker.active_children(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn removal_of_running_job_terminates_and_archives() {
    let (queue, store, _) = test_queue(WORKER);
    let mut worker = worker_with_inline(&queue).await;

    let mut args = Map::new();
    args.insert("ms".to_string(), json!(2_000));
    let job = queue
        .enqueue("demo.jobs.Sleep", args, EnqueueOptions::default())
        .await
        .unwrap();

    worker.tick().await.unwrap();
    queue.remove_job(&job.id).await.unwrap();
    worker.tick().await.unwrap();

    let snap = store.snapshot();
    let archived = snap.journal[&job.id.to_hex()].clone();
    assert!(archived.removed_at.is_some());
    assert!(archived.is_terminal());
    assert!(snap.queue.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn wall_violation_flags_then_kills_opted_in_jobs() {
    let (queue, store, clock) = test_queue(WORKER);
    let mut worker = worker_with_inline(&queue).await;

    let mut args = Map::new();
    args.insert("ms".to_string(), json!(3_000));
    let job = queue
        .enqueue("demo.jobs.SleepWalled", args, EnqueueOptions::default())
        .await
        .unwrap();

    worker.tick().await.unwrap();
    assert_eq!(worker.active_children(), 1);

    // Within wall_time nothing happens.
    worker.tick().await.unwrap();
    assert!(store.snapshot().queue[&job.id.to_hex()].wall_at.is_none());

    clock.advance(Duration::from_secs(2));
    worker.tick().await.unwrap();

    let snap = store.snapshot();
    let killed = snap.journal[&job.id.to_hex()].clone();
    assert_eq!(killed.state, JobState::Killed);
    assert!(killed.wall_at.is_some());
    assert!(killed.killed_at.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_progress_gets_zombie_flag_only() {
    let (queue, store, clock) = test_queue(WORKER);
    let mut worker = worker_with_inline(&queue).await;

    let mut args = Map::new();
    args.insert("ms".to_string(), json!(3_000));
    let job = queue
        .enqueue("demo.jobs.SleepZombie", args, EnqueueOptions::default())
        .await
        .unwrap();

    worker.tick().await.unwrap();
    clock.advance(Duration::from_secs(2));
    worker.tick().await.unwrap();

    let flagged = store.snapshot().queue[&job.id.to_hex()].clone();
    // Flag only: the job keeps running, the owning worker stays responsible.
    assert!(flagged.zombie_at.is_some());
    assert_eq!(flagged.state, JobState::Running);
}

#[tokio::test(flavor = "multi_thread")]
async fn expires_locks_of_vanished_workers() {
    let (queue, store, clock) = test_queue(WORKER);
    let mut worker = worker_with_inline(&queue).await;

    // Fabricate a RUNNING job owned by a worker that no longer exists.
    let now = clock.epoch_ms();
    let mut ghost_job = job_record("demo.jobs.Ok", now);
    ghost_job.state = JobState::Running;
    ghost_job.started_at = Some(now);
    ghost_job.zombie_time = 1;
    ghost_job.locked = Some(LockInfo {
        worker: "gone:worker:9".to_string(),
        acquired: now,
        heartbeat: now,
    });
    queue.store().insert_job(&ghost_job).await.unwrap();
    assert!(queue
        .store()
        .acquire_lock(&ghost_job.id, "gone:worker:9", now)
        .await
        .unwrap());

    clock.advance(Duration::from_secs(2));
    worker.tick().await.unwrap();

    let snap = store.snapshot();
    // attempts = 1 → the reclaim transition lands in terminal ERROR.
    let reclaimed = snap.journal[&ghost_job.id.to_hex()].clone();
    assert_eq!(reclaimed.state, JobState::Error);
    assert!(reclaimed
        .error
        .as_deref()
        .is_some_and(|e| e.contains("gone:worker:9")));
    assert!(snap.locks.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn halt_stops_claiming_and_enters_stopping() {
    let (queue, store, _) = test_queue(WORKER);
    let mut worker = worker_with_inline(&queue).await;

    queue
        .enqueue("demo.jobs.Ok", Map::new(), EnqueueOptions::default())
        .await
        .unwrap();
    queue.halt().await.unwrap();

    worker.tick().await.unwrap();
    assert!(worker.is_stopping());
    // Nothing was claimed after the halt was observed.
    assert_eq!(worker.active_children(), 0);
    let pending: Vec<_> = store.snapshot().queue.values().cloned().collect();
    assert_eq!(pending[0].state, JobState::Pending);
}

#[tokio::test(flavor = "multi_thread")]
async fn maintenance_gates_claims_until_lifted() {
    let (queue, _, _) = queue_with_registry(WORKER, test_registry());
    let mut worker = worker_with_inline(&queue).await;

    queue
        .enqueue("demo.jobs.Ok", Map::new(), EnqueueOptions::default())
        .await
        .unwrap();
    queue.enter_maintenance(None).await.unwrap();

    worker.tick().await.unwrap();
    assert_eq!(worker.active_children(), 0);

    queue.leave_maintenance(None).await.unwrap();
    worker.tick().await.unwrap();
    assert_eq!(worker.active_children(), 1);
    drain(&mut worker).await;
}

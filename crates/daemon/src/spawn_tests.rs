// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::test_queue;
use gantry_core::JobState;
use gantry_queue::EnqueueOptions;
use serde_json::{json, Map};
use std::time::Duration;

async fn wait_for_exit(handle: &mut Box<dyn ExecHandle>) -> ExecExit {
    for _ in 0..200 {
        if let Some(exit) = handle.poll().await.unwrap() {
            return exit;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("executor never exited");
}

#[tokio::test(flavor = "multi_thread")]
async fn inline_spawner_runs_to_clean_exit() {
    let (queue, store, _) = test_queue("host:worker:w");
    let job = queue
        .enqueue("demo.jobs.Ok", Map::new(), EnqueueOptions::default())
        .await
        .unwrap();
    queue.claim("host:worker:w").await.unwrap().unwrap();

    let spawner = InlineSpawner::new(queue.clone());
    let mut handle = spawner.spawn(&queue.job_detail(&job.id).await.unwrap()).await.unwrap();

    let exit = wait_for_exit(&mut handle).await;
    assert_eq!(exit.code, Some(0));
    assert!(exit.clean());

    let done = store.snapshot().journal[&job.id.to_hex()].clone();
    assert_eq!(done.state, JobState::Complete);
}

#[tokio::test(flavor = "multi_thread")]
async fn inline_spawner_reports_dirty_exit_for_failed_transition() {
    let (queue, _, _) = test_queue("host:worker:w");
    // Spawning for a job id that does not exist makes run_job fail.
    let ghost = gantry_core::test_support::job_record("demo.jobs.Ok", queue.now_ms());

    let spawner = InlineSpawner::new(queue.clone());
    let mut handle = spawner.spawn(&ghost).await.unwrap();

    let exit = wait_for_exit(&mut handle).await;
    assert_eq!(exit.code, Some(1));
    assert!(!exit.clean());
}

#[tokio::test(flavor = "multi_thread")]
async fn inline_kill_aborts_the_task() {
    let (queue, store, _) = test_queue("host:worker:w");
    let mut args = Map::new();
    args.insert("ms".to_string(), json!(1_000));
    let job = queue
        .enqueue("demo.jobs.Sleep", args, EnqueueOptions::default())
        .await
        .unwrap();
    queue.claim("host:worker:w").await.unwrap().unwrap();

    let spawner = InlineSpawner::new(queue.clone());
    let mut handle = spawner.spawn(&queue.job_detail(&job.id).await.unwrap()).await.unwrap();

    handle.kill().await.unwrap();
    let exit = wait_for_exit(&mut handle).await;
    assert_eq!(exit.code, None);
    assert!(!exit.clean());

    // No terminal state was written; the job is still RUNNING for the
    // worker to clean up.
    let job_after = store.snapshot().queue[&job.id.to_hex()].clone();
    assert_eq!(job_after.state, JobState::Running);
}

#[test]
fn exec_exit_clean_only_for_zero() {
    let zero = ExecExit {
        code: Some(0),
        output: String::new(),
    };
    let seven = ExecExit {
        code: Some(7),
        output: String::new(),
    };
    let signalled = ExecExit {
        code: None,
        output: String::new(),
    };
    assert!(zero.clean());
    assert!(!seven.clean());
    assert!(!signalled.clean());
}

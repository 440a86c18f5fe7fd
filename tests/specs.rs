// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios: real worker and scheduler loops against a shared
//! in-memory store, with executors running as inline tasks, plus smoke
//! tests of the `gantry` binary itself.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gantry_core::test_support::job_record;
use gantry_core::{
    Config, Context, DaemonKind, JobContext, JobError, JobSpec, JobState, LockInfo, Registry,
    Runnable, SystemClock,
};
use gantry_daemon::{InlineSpawner, Scheduler, Worker};
use gantry_queue::{EnqueueOptions, Queue};
use gantry_storage::{MemStore, Store};
use serde_json::{json, Map, Value};

struct InstantJob {
    log: Option<Arc<Mutex<Vec<String>>>>,
}

impl Runnable for InstantJob {
    fn run(&self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        if let Some(log) = &self.log {
            let tag = ctx
                .arg("tag")
                .and_then(Value::as_str)
                .unwrap_or("?")
                .to_string();
            if let Ok(mut entries) = log.lock() {
                entries.push(tag);
            }
        }
        Ok(())
    }
}

/// Defers until the shared run counter reaches the configured attempt.
struct FlakyJob {
    runs: Arc<AtomicU32>,
    succeed_on: u32,
}

impl Runnable for FlakyJob {
    fn run(&self, _ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        if run < self.succeed_on {
            return Err(JobError::deferred(format!("attempt {}", run)));
        }
        Ok(())
    }
}

/// Sleeps far past its wall time in small chunks.
struct SleepyJob;

impl Runnable for SleepyJob {
    fn run(&self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        let total = ctx.arg("ms").and_then(Value::as_u64).unwrap_or(6_000);
        let mut slept = 0;
        while slept < total {
            std::thread::sleep(Duration::from_millis(50));
            slept += 50;
        }
        Ok(())
    }
}

struct Fixture {
    store: Arc<MemStore>,
    config: Config,
    registry: Arc<Registry>,
}

impl Fixture {
    fn new(registry: Registry) -> Self {
        let mut config = Config::for_state_dir(PathBuf::from("/tmp/gantry-specs"));
        config.concurrency = 1;
        config.worker_tick_ms = 50;
        config.scheduler_tick_ms = 50;
        Self {
            store: Arc::new(MemStore::new()),
            config,
            registry: Arc::new(registry),
        }
    }

    fn queue(&self, identifier: &str) -> Queue<SystemClock> {
        Queue::new(
            Arc::clone(&self.store) as Arc<dyn Store>,
            Arc::clone(&self.registry),
            SystemClock,
            Context::new(identifier, self.config.clone()),
        )
    }

    async fn worker(&self, identifier: &str) -> Worker<SystemClock> {
        let queue = self.queue(identifier);
        let spawner = Arc::new(InlineSpawner::new(queue.clone()));
        Worker::new(queue, spawner).await.unwrap()
    }

    fn journal_of(&self, name: &str) -> Vec<gantry_core::JobRecord> {
        self.store
            .snapshot()
            .journal
            .values()
            .filter(|j| j.name == name)
            .cloned()
            .collect()
    }
}

/// Tick the worker until `done` (with no children in flight) or panic when
/// the wall-clock budget runs out.
async fn drive(
    worker: &mut Worker<SystemClock>,
    budget: Duration,
    mut done: impl FnMut() -> bool,
) {
    let deadline = std::time::Instant::now() + budget;
    while std::time::Instant::now() < deadline {
        worker.tick().await.unwrap();
        if done() && worker.active_children() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("scenario did not converge within {:?}", budget);
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_enqueue_to_complete() {
    let mut registry = Registry::new();
    registry
        .register(JobSpec::new("spec.jobs.Dummy", || {
            Box::new(InstantJob { log: None })
        }))
        .unwrap();
    let fixture = Fixture::new(registry);
    let queue = fixture.queue("host:cli:t");

    let mut args = Map::new();
    args.insert("x".to_string(), json!(1));
    let job = queue
        .enqueue("spec.jobs.Dummy", args, EnqueueOptions::default())
        .await
        .unwrap();

    let mut worker = fixture.worker("host:worker:w1").await;
    drive(&mut worker, Duration::from_secs(5), || {
        !fixture.journal_of("spec.jobs.Dummy").is_empty()
    })
    .await;

    let done = &fixture.journal_of("spec.jobs.Dummy")[0];
    assert_eq!(done.id, job.id);
    assert_eq!(done.state, JobState::Complete);
    assert_eq!(done.attempts_left, done.attempts - 1);
    assert!(fixture.store.snapshot().locks.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_deferrals_do_not_consume_attempts() {
    let runs = Arc::new(AtomicU32::new(0));
    let mut registry = Registry::new();
    let factory_runs = Arc::clone(&runs);
    registry
        .register(
            JobSpec::new("spec.jobs.Flaky", move || {
                Box::new(FlakyJob {
                    runs: Arc::clone(&factory_runs),
                    succeed_on: 3,
                })
            })
            .with_attempts(5)
            .with_defer_time(1),
        )
        .unwrap();
    let fixture = Fixture::new(registry);
    let queue = fixture.queue("host:cli:t");

    queue
        .enqueue("spec.jobs.Flaky", Map::new(), EnqueueOptions::default())
        .await
        .unwrap();

    let mut worker = fixture.worker("host:worker:w1").await;
    drive(&mut worker, Duration::from_secs(15), || {
        !fixture.journal_of("spec.jobs.Flaky").is_empty()
    })
    .await;

    let journal = fixture.journal_of("spec.jobs.Flaky");
    assert_eq!(journal.len(), 1);
    assert_eq!(journal[0].state, JobState::Complete);
    // Two deferred attempts consumed nothing; completion consumed one.
    assert_eq!(journal[0].attempts_left, journal[0].attempts - 1);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_wall_time_flags_then_kills() {
    let mut registry = Registry::new();
    registry
        .register(
            JobSpec::new("spec.jobs.Sleepy", || Box::new(SleepyJob))
                .with_wall_time(2)
                .with_wall_kill(true),
        )
        .unwrap();
    let fixture = Fixture::new(registry);
    let queue = fixture.queue("host:cli:t");

    queue
        .enqueue("spec.jobs.Sleepy", Map::new(), EnqueueOptions::default())
        .await
        .unwrap();

    let mut worker = fixture.worker("host:worker:w1").await;
    drive(&mut worker, Duration::from_secs(10), || {
        !fixture.journal_of("spec.jobs.Sleepy").is_empty()
    })
    .await;

    let killed = &fixture.journal_of("spec.jobs.Sleepy")[0];
    assert_eq!(killed.state, JobState::Killed);
    assert!(killed.wall_at.is_some());
    assert!(killed.killed_at.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_priority_order_is_respected() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = Registry::new();
    let factory_log = Arc::clone(&log);
    registry
        .register(JobSpec::new("spec.jobs.Ordered", move || {
            Box::new(InstantJob {
                log: Some(Arc::clone(&factory_log)),
            })
        }))
        .unwrap();
    let fixture = Fixture::new(registry);
    let queue = fixture.queue("host:cli:t");

    // Enqueue out of priority order; ties break by enqueue time.
    let priorities = [30i32, 10, 20, 10, 30, 20];
    for (i, priority) in priorities.iter().enumerate() {
        let mut args = Map::new();
        args.insert("tag".to_string(), json!(format!("p{}-{}", priority, i)));
        queue
            .enqueue(
                "spec.jobs.Ordered",
                args,
                EnqueueOptions {
                    priority: Some(*priority),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let mut worker = fixture.worker("host:worker:w1").await;
    drive(&mut worker, Duration::from_secs(10), || {
        fixture.journal_of("spec.jobs.Ordered").len() == priorities.len()
    })
    .await;

    let order = log.lock().map(|l| l.clone()).unwrap_or_default();
    assert_eq!(order, ["p10-1", "p10-3", "p20-2", "p20-5", "p30-0", "p30-4"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_maintenance_gates_claims() {
    let mut registry = Registry::new();
    registry
        .register(JobSpec::new("spec.jobs.Gated", || {
            Box::new(InstantJob { log: None })
        }))
        .unwrap();
    let fixture = Fixture::new(registry);
    let queue = fixture.queue("host:cli:t");

    queue.enter_maintenance(None).await.unwrap();
    let job = queue
        .enqueue("spec.jobs.Gated", Map::new(), EnqueueOptions::default())
        .await
        .unwrap();

    let mut worker = fixture.worker("host:worker:w1").await;
    for _ in 0..5 {
        worker.tick().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let parked = fixture.store.snapshot().queue[&job.id.to_hex()].clone();
    assert_eq!(parked.state, JobState::Pending);

    queue.leave_maintenance(None).await.unwrap();
    drive(&mut worker, Duration::from_secs(5), || {
        !fixture.journal_of("spec.jobs.Gated").is_empty()
    })
    .await;
    assert_eq!(
        fixture.journal_of("spec.jobs.Gated")[0].state,
        JobState::Complete
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_worker_crash_recovery() {
    let mut registry = Registry::new();
    registry
        .register(
            JobSpec::new("spec.jobs.Load", || Box::new(InstantJob { log: None }))
                .with_attempts(2)
                .with_defer_time(1)
                .with_zombie_time(1),
        )
        .unwrap();
    let fixture = Fixture::new(registry);
    let queue = fixture.queue("host:cli:t");

    const JOBS: usize = 30;
    for i in 0..JOBS {
        let mut args = Map::new();
        args.insert("tag".to_string(), json!(format!("j{}", i)));
        queue
            .enqueue("spec.jobs.Load", args, EnqueueOptions::default())
            .await
            .unwrap();
    }

    let mut doomed = fixture.worker("host:worker:doomed").await;
    let mut survivor = fixture.worker("host:worker:survivor").await;

    // Both workers make progress for a while.
    for _ in 0..6 {
        doomed.tick().await.unwrap();
        survivor.tick().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // The doomed worker "crashes": it never ticks again and its daemon
    // record disappears. Two of its jobs died with their executors and
    // stay RUNNING behind orphaned locks.
    fixture
        .store
        .remove_daemon("host:worker:doomed")
        .await
        .unwrap();
    drop(doomed);

    let now = queue.now_ms();
    let mut orphaned = Vec::new();
    for i in 0..2 {
        let mut ghost = job_record("spec.jobs.Load", now);
        ghost.args
            .insert("tag".to_string(), json!(format!("ghost{}", i)));
        ghost.fingerprint =
            gantry_core::job::fingerprint("spec.jobs.Load", &ghost.args);
        ghost.state = JobState::Running;
        ghost.started_at = Some(now);
        ghost.attempts = 2;
        ghost.attempts_left = 2;
        ghost.defer_time = 1;
        ghost.zombie_time = 1;
        ghost.locked = Some(LockInfo {
            worker: "host:worker:doomed".to_string(),
            acquired: now,
            heartbeat: now,
        });
        fixture.store.insert_job(&ghost).await.unwrap();
        assert!(fixture
            .store
            .acquire_lock(&ghost.id, "host:worker:doomed", now)
            .await
            .unwrap());
        orphaned.push(ghost.id);
    }

    // Let the orphaned locks cross zombie_time, then let the survivor
    // sweep, reclaim, and finish everything.
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    drive(&mut survivor, Duration::from_secs(20), || {
        let snap = fixture.store.snapshot();
        snap.queue.is_empty() && snap.journal.len() == JOBS + 2 && snap.locks.is_empty()
    })
    .await;

    let snap = fixture.store.snapshot();
    for job in snap.journal.values() {
        assert!(job.is_terminal());
        assert!(job.attempts_left <= job.attempts);
    }
    // The orphaned jobs were reclaimed, retried, and completed.
    for id in orphaned {
        assert_eq!(snap.journal[&id.to_hex()].state, JobState::Complete);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn halt_converges_and_daemons_deregister() {
    let mut registry = Registry::new();
    registry
        .register(
            JobSpec::new("spec.jobs.Cron", || Box::new(InstantJob { log: None }))
                .with_schedule("* * * * *"),
        )
        .unwrap();
    let fixture = Fixture::new(registry);
    let queue = fixture.queue("host:cli:t");

    let worker = fixture.worker("host:worker:w1").await;
    let scheduler = Scheduler::new(fixture.queue("host:scheduler:s1"))
        .await
        .unwrap();
    assert_eq!(fixture.store.list_daemons().await.unwrap().len(), 2);

    queue.halt().await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), worker.run())
        .await
        .unwrap()
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), scheduler.run())
        .await
        .unwrap()
        .unwrap();

    assert!(fixture.store.list_daemons().await.unwrap().is_empty());

    // Daemons registered after the halt run normally.
    let fresh = gantry_daemon::DaemonHandle::register(
        fixture.queue("host:worker:late"),
        DaemonKind::Worker,
    )
    .await
    .unwrap();
    assert!(!fresh.halted().await.unwrap());
}

mod cli {
    use assert_cmd::Command;
    use tempfile::TempDir;

    fn gantry(state: &TempDir) -> Command {
        let mut cmd = Command::cargo_bin("gantry").unwrap();
        cmd.env("GANTRY_STATE_DIR", state.path());
        cmd
    }

    #[test]
    fn no_command_is_an_error() {
        let state = TempDir::new().unwrap();
        gantry(&state)
            .assert()
            .failure()
            .code(1)
            .stderr(predicates::str::contains("nothing to do."));
    }

    #[test]
    fn enqueue_then_listing() {
        let state = TempDir::new().unwrap();
        let out = gantry(&state)
            .args(["--enqueue", "gantry.jobs.DummyJob", "x=1"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("enqueueing [gantry.jobs.DummyJob]"));

        // Second enqueue of the same (name, args) is a duplicate.
        gantry(&state)
            .args(["--enqueue", "gantry.jobs.DummyJob", "x=1"])
            .assert()
            .failure()
            .code(1)
            .stderr(predicates::str::contains("duplicate job"));

        gantry(&state)
            .args(["--listing", "pending"])
            .assert()
            .success()
            .stdout(predicates::str::contains("gantry.jobs.DummyJob"));

        gantry(&state)
            .args(["--listing", "bogus"])
            .assert()
            .failure()
            .code(1)
            .stderr(predicates::str::contains("unknown state [bogus]"));
    }

    #[test]
    fn enqueue_unknown_class_fails() {
        let state = TempDir::new().unwrap();
        gantry(&state)
            .args(["--enqueue", "gantry.jobs.Nope"])
            .assert()
            .failure()
            .code(1)
            .stderr(predicates::str::contains("unknown job class"));
    }

    #[test]
    fn pause_mode_resume_cycle() {
        let state = TempDir::new().unwrap();
        gantry(&state)
            .arg("--pause")
            .assert()
            .success()
            .stdout(predicates::str::contains("entering maintenance"));

        gantry(&state)
            .arg("--mode")
            .assert()
            .success()
            .stdout(predicates::str::contains("true"));

        gantry(&state)
            .arg("--resume")
            .assert()
            .success()
            .stdout(predicates::str::contains("leaving maintenance"));

        gantry(&state)
            .arg("--resume")
            .assert()
            .success()
            .stdout(predicates::str::contains("not in maintenance"));
    }

    #[test]
    fn halt_and_alive() {
        let state = TempDir::new().unwrap();
        gantry(&state)
            .arg("--halt")
            .assert()
            .success()
            .stdout(predicates::str::contains("system halt"));

        gantry(&state)
            .arg("--alive")
            .assert()
            .success()
            .stdout(predicates::str::contains("no daemon."));
    }

    #[test]
    fn info_with_empty_queue() {
        let state = TempDir::new().unwrap();
        gantry(&state)
            .arg("--info")
            .assert()
            .success()
            .stdout(predicates::str::contains("no jobs."));
    }
}

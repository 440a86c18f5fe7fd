// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gantry_core::test_support::job_record;
use gantry_core::{DaemonKind, DaemonRecord};
use std::sync::Arc;

#[tokio::test]
async fn job_insert_fetch_archive() {
    let store = MemStore::new();
    let job = job_record("acme.jobs.Report", 1_000);

    store.insert_job(&job).await.unwrap();
    assert_eq!(store.fetch_job(&job.id).await.unwrap().name, job.name);

    store.archive_job(&job.id).await.unwrap();
    assert!(store.snapshot().queue.is_empty());
    assert_eq!(store.list_journal(None).await.unwrap().len(), 1);
    // Still fetchable from the journal.
    assert!(store.fetch_job(&job.id).await.is_ok());
}

#[tokio::test]
async fn concurrent_lock_acquisition_has_one_winner() {
    let store = Arc::new(MemStore::new());
    let job = job_record("acme.jobs.Report", 1_000);
    store.insert_job(&job).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = Arc::clone(&store);
        let id = job.id;
        handles.push(tokio::spawn(async move {
            store
                .acquire_lock(&id, &format!("host:worker:{}", i), 1_000)
                .await
                .unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn daemon_registry_round_trip() {
    let store = MemStore::new();
    let rec = DaemonRecord::new(
        "host:worker:alpha".into(),
        DaemonKind::Worker,
        "host".into(),
        1_000,
    );

    store.upsert_daemon(&rec).await.unwrap();
    let listed = store.list_daemons().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, rec.id);

    store.remove_daemon(&rec.id).await.unwrap();
    assert!(store.list_daemons().await.unwrap().is_empty());
    // Idempotent.
    store.remove_daemon(&rec.id).await.unwrap();
}

#[tokio::test]
async fn maintenance_and_halt_flags() {
    let store = MemStore::new();
    assert!(!store.get_maintenance().await.unwrap().any());
    assert_eq!(store.get_halt().await.unwrap(), None);

    store.set_maintenance(None, 1_000).await.unwrap();
    store.set_maintenance(Some("acme"), 1_100).await.unwrap();
    let flags = store.get_maintenance().await.unwrap();
    assert!(flags.gates("anything"));
    assert_eq!(flags.projects.len(), 1);

    store.clear_maintenance(None).await.unwrap();
    let flags = store.get_maintenance().await.unwrap();
    assert!(flags.gates("acme"));
    assert!(!flags.gates("other"));

    store.set_halt(5_000).await.unwrap();
    assert_eq!(store.get_halt().await.unwrap(), Some(5_000));
}

#[tokio::test]
async fn stdout_log_round_trip() {
    let store = MemStore::new();
    let job = job_record("acme.jobs.Report", 1_000);

    assert_eq!(store.read_stdout(&job.id).await.unwrap(), None);
    store.write_stdout(&job.id, "line one\n").await.unwrap();
    assert_eq!(
        store.read_stdout(&job.id).await.unwrap().as_deref(),
        Some("line one\n")
    );
}

#[tokio::test]
async fn prefix_search_spans_queue_and_journal() {
    let store = MemStore::new();
    let a = job_record("acme.jobs.A", 1_000);
    let b = job_record("acme.jobs.B", 1_000);
    store.insert_job(&a).await.unwrap();
    store.insert_job(&b).await.unwrap();
    store.archive_job(&a.id).await.unwrap();

    let hits = store.find_by_prefix(&a.id.to_hex()[..12]).await.unwrap();
    assert!(hits.iter().any(|j| j.id == a.id));
}

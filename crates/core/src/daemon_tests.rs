// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn identifier_uses_name_when_given() {
    let id = daemon_identifier(DaemonKind::Worker, Some("alpha"));
    assert!(id.ends_with(":worker:alpha"), "got {}", id);
}

#[test]
fn identifier_falls_back_to_pid() {
    let id = daemon_identifier(DaemonKind::Scheduler, None);
    let pid = std::process::id().to_string();
    assert!(id.ends_with(&format!(":scheduler:{}", pid)), "got {}", id);

    let empty = daemon_identifier(DaemonKind::App, Some(""));
    assert!(empty.contains(":app:"), "got {}", empty);
}

#[test]
fn beat_updates_loop_bookkeeping() {
    let mut rec = DaemonRecord::new(
        "host:worker:1".into(),
        DaemonKind::Worker,
        "host".into(),
        1_000,
    );
    assert_eq!(rec.phase, DaemonPhase::Starting);
    assert_eq!(rec.loop_count, 0);

    rec.beat(2_000);
    rec.beat(3_000);
    assert_eq!(rec.loop_count, 2);
    assert_eq!(rec.loop_time, 3_000);
    assert_eq!(rec.heartbeat, 3_000);
}

#[test]
fn record_serde_round_trip() {
    let rec = DaemonRecord::new(
        "host:app:web".into(),
        DaemonKind::App,
        "host".into(),
        1_000,
    );
    let json = serde_json::to_string(&rec).unwrap();
    let back: DaemonRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, rec);
    assert!(json.contains("\"kind\":\"app\""));
    assert!(json.contains("\"phase\":\"starting\""));
}

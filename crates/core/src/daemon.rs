// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon registry records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of daemon a registry entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonKind {
    Worker,
    Scheduler,
    App,
}

impl fmt::Display for DaemonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonKind::Worker => write!(f, "worker"),
            DaemonKind::Scheduler => write!(f, "scheduler"),
            DaemonKind::App => write!(f, "app"),
        }
    }
}

/// Lifecycle phase of a daemon process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonPhase {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for DaemonPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonPhase::Starting => write!(f, "starting"),
            DaemonPhase::Running => write!(f, "running"),
            DaemonPhase::Stopping => write!(f, "stopping"),
            DaemonPhase::Stopped => write!(f, "stopped"),
        }
    }
}

/// Row in the `daemon` collection. Created at startup, refreshed every loop
/// tick, removed on clean exit. A stale `heartbeat` is how the rest of the
/// fleet detects a dead daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonRecord {
    pub id: String,
    pub kind: DaemonKind,
    pub pid: u32,
    pub hostname: String,
    pub started_at: u64,
    #[serde(default)]
    pub loop_count: u64,
    #[serde(default)]
    pub loop_time: u64,
    pub heartbeat: u64,
    pub phase: DaemonPhase,
}

impl DaemonRecord {
    pub fn new(id: String, kind: DaemonKind, hostname: String, started_at: u64) -> Self {
        Self {
            id,
            kind,
            pid: std::process::id(),
            hostname,
            started_at,
            loop_count: 0,
            loop_time: started_at,
            heartbeat: started_at,
            phase: DaemonPhase::Starting,
        }
    }

    /// Refresh the per-tick bookkeeping.
    pub fn beat(&mut self, now_ms: u64) {
        self.loop_count += 1;
        self.loop_time = now_ms;
        self.heartbeat = now_ms;
    }
}

/// Hostname of this machine, `localhost` when undeterminable.
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Canonical daemon identifier: `{hostname}:{kind}:{name-or-pid}`.
pub fn daemon_identifier(kind: DaemonKind, name: Option<&str>) -> String {
    let host = local_hostname();
    match name {
        Some(n) if !n.is_empty() => format!("{}:{}:{}", host, kind, n),
        _ => format!("{}:{}:{}", host, kind, std::process::id()),
    }
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime configuration: state directory resolution, optional TOML overlay,
//! environment overrides.

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Default worker tick period in milliseconds.
pub const DEFAULT_WORKER_TICK_MS: u64 = 1_000;
/// Default scheduler tick period in milliseconds.
pub const DEFAULT_SCHEDULER_TICK_MS: u64 = 3_000;
/// Default executor slots per worker.
pub const DEFAULT_CONCURRENCY: usize = 4;
/// Default grace period before an unreachable store is fatal.
pub const DEFAULT_STORE_GRACE_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
}

/// Resolved runtime configuration shared by daemons, executor, and CLI.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory.
    pub state_dir: PathBuf,
    /// Path of the coordination store document.
    pub store_path: PathBuf,
    /// Directory for daemon log files.
    pub logs_dir: PathBuf,
    /// Username recorded on enqueue.
    pub username: String,
    pub worker_tick_ms: u64,
    pub scheduler_tick_ms: u64,
    /// Executor slots per worker.
    pub concurrency: usize,
    /// When true, an attempt is consumed at the claim transition instead of
    /// after user code returns. Closes the crash-retry-forever loophole at
    /// the cost of charging attempts for pre-run crashes.
    pub attempt_on_claim: bool,
    /// Store outages longer than this terminate the daemon.
    pub store_grace_secs: u64,
}

/// Optional `gantry.toml` overlay; every field defaults to the built-in.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    store_path: Option<PathBuf>,
    worker_tick_ms: Option<u64>,
    scheduler_tick_ms: Option<u64>,
    concurrency: Option<usize>,
    attempt_on_claim: Option<bool>,
    store_grace_secs: Option<u64>,
}

impl Config {
    /// Load configuration: state dir from the environment, then the optional
    /// `gantry.toml` overlay inside it, then per-key env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let state_dir = state_dir()?;
        let file = read_file_config(&state_dir.join("gantry.toml"))?;

        let mut config = Self {
            store_path: file
                .store_path
                .unwrap_or_else(|| state_dir.join("store.json")),
            logs_dir: state_dir.join("logs"),
            username: std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
            worker_tick_ms: file.worker_tick_ms.unwrap_or(DEFAULT_WORKER_TICK_MS),
            scheduler_tick_ms: file
                .scheduler_tick_ms
                .unwrap_or(DEFAULT_SCHEDULER_TICK_MS),
            concurrency: file.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            attempt_on_claim: file.attempt_on_claim.unwrap_or(false),
            store_grace_secs: file.store_grace_secs.unwrap_or(DEFAULT_STORE_GRACE_SECS),
            state_dir,
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(ms) = env_u64("GANTRY_WORKER_TICK_MS") {
            self.worker_tick_ms = ms;
        }
        if let Some(ms) = env_u64("GANTRY_SCHEDULER_TICK_MS") {
            self.scheduler_tick_ms = ms;
        }
        if let Some(n) = env_u64("GANTRY_CONCURRENCY") {
            self.concurrency = n as usize;
        }
        if let Ok(v) = std::env::var("GANTRY_ATTEMPT_ON_CLAIM") {
            self.attempt_on_claim = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Some(secs) = env_u64("GANTRY_STORE_GRACE_SECS") {
            self.store_grace_secs = secs;
        }
    }

    /// A configuration rooted at an explicit directory, defaults otherwise.
    /// Integration tests point this at a temp dir for isolation.
    pub fn for_state_dir(state_dir: PathBuf) -> Self {
        Self {
            store_path: state_dir.join("store.json"),
            logs_dir: state_dir.join("logs"),
            username: std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
            worker_tick_ms: DEFAULT_WORKER_TICK_MS,
            scheduler_tick_ms: DEFAULT_SCHEDULER_TICK_MS,
            concurrency: DEFAULT_CONCURRENCY,
            attempt_on_claim: false,
            store_grace_secs: DEFAULT_STORE_GRACE_SECS,
            state_dir,
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn read_file_config(path: &PathBuf) -> Result<FileConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            toml::from_str(&text).map_err(|e| ConfigError::Parse(path.clone(), e))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(e) => Err(ConfigError::Io(path.clone(), e)),
    }
}

/// Resolve the gantry state directory.
///
/// `GANTRY_STATE_DIR` takes priority (tests use it for isolation), then
/// `XDG_STATE_HOME/gantry`, then `~/.local/state/gantry`.
fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("GANTRY_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }

    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("gantry"));
    }

    let home = std::env::var("HOME").map_err(|_| ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/gantry"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

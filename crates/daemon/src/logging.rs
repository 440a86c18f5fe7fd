// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon logging: non-blocking file output with startup-time rotation.

use std::path::{Path, PathBuf};

use gantry_core::Config;

use crate::error::DaemonError;

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep.
const MAX_ROTATED_LOGS: u32 = 3;

/// Log file path for a daemon identifier (colons are path-hostile).
pub fn log_path(config: &Config, identifier: &str) -> PathBuf {
    let name = identifier.replace([':', '/'], "-");
    config.logs_dir.join(format!("{}.log", name))
}

/// Install the tracing subscriber writing to this daemon's log file.
/// Returns the guard that flushes buffered lines on drop.
pub fn setup_logging(
    config: &Config,
    identifier: &str,
) -> Result<tracing_appender::non_blocking::WorkerGuard, DaemonError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(&config.logs_dir)?;
    let path = log_path(config, identifier);
    rotate_log_if_needed(&path);

    let file_name = path
        .file_name()
        .ok_or_else(|| DaemonError::Setup("empty log file name".to_string()))?;
    let file_appender = tracing_appender::rolling::never(&config.logs_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}

/// Rotate the log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `x.log` → `x.log.1` → … → `x.log.3`, deleting the oldest.
/// Best-effort: rotation failures never stop a daemon from starting.
fn rotate_log_if_needed(log_path: &Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };

    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();

    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor child management.
//!
//! The subprocess boundary is a failure-isolation device: a worker never
//! runs user job code in-process. [`ProcessSpawner`] forks the gantry
//! binary in executor mode, handing the job id over the child's stdin and
//! capturing its stdout/stderr for the stdout log. [`InlineSpawner`] runs
//! the executor as an in-process task against a shared store — the test
//! double, in the shape of the real thing.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use gantry_core::{Clock, JobId, JobRecord};
use gantry_queue::Queue;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::error::DaemonError;

/// How an executor child ended.
#[derive(Debug)]
pub struct ExecExit {
    /// Process exit code; None when killed by signal (or aborted inline).
    pub code: Option<i32>,
    /// Captured stdout+stderr.
    pub output: String,
}

impl ExecExit {
    /// A clean exit wrote its own terminal state; anything else is a dirty
    /// exit the worker must fail on the child's behalf.
    pub fn clean(&self) -> bool {
        self.code == Some(0)
    }
}

/// A running executor child.
#[async_trait]
pub trait ExecHandle: Send {
    /// Non-blocking exit check: Some when the child has terminated.
    async fn poll(&mut self) -> Result<Option<ExecExit>, DaemonError>;

    /// Terminate the child.
    async fn kill(&mut self) -> Result<(), DaemonError>;
}

/// Spawns executor children for claimed jobs.
#[async_trait]
pub trait ExecSpawner: Send + Sync {
    async fn spawn(&self, job: &JobRecord) -> Result<Box<dyn ExecHandle>, DaemonError>;
}

// --- subprocess spawner ---

/// Forks `<gantry> --execute` per job.
pub struct ProcessSpawner {
    exe: PathBuf,
}

impl ProcessSpawner {
    /// Spawn children from the currently running binary.
    pub fn from_current_exe() -> Result<Self, DaemonError> {
        let exe = std::env::current_exe()
            .map_err(|e| DaemonError::Setup(format!("cannot locate own binary: {}", e)))?;
        Ok(Self { exe })
    }

    pub fn new(exe: PathBuf) -> Self {
        Self { exe }
    }
}

#[async_trait]
impl ExecSpawner for ProcessSpawner {
    async fn spawn(&self, job: &JobRecord) -> Result<Box<dyn ExecHandle>, DaemonError> {
        let mut child = Command::new(&self.exe)
            .arg("--execute")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DaemonError::Spawn(e.to_string()))?;

        // Hand over the job id and close stdin so the child sees EOF.
        if let Some(mut stdin) = child.stdin.take() {
            let line = format!("{}\n", job.id);
            stdin
                .write_all(line.as_bytes())
                .await
                .map_err(|e| DaemonError::Spawn(format!("stdin write failed: {}", e)))?;
        }

        let output = Arc::new(Mutex::new(String::new()));
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, Arc::clone(&output)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, Arc::clone(&output)));
        }

        tracing::debug!(job_id = %job.id, exe = %self.exe.display(), "executor spawned");
        Ok(Box::new(ProcessHandle {
            child,
            output,
            readers,
        }))
    }
}

fn spawn_reader(
    mut source: impl AsyncReadExt + Unpin + Send + 'static,
    sink: Arc<Mutex<String>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match source.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    sink.lock().push_str(&String::from_utf8_lossy(&buf[..n]));
                }
            }
        }
    })
}

struct ProcessHandle {
    child: Child,
    output: Arc<Mutex<String>>,
    readers: Vec<JoinHandle<()>>,
}

impl ProcessHandle {
    async fn drain_output(&mut self) -> String {
        for reader in self.readers.drain(..) {
            let _ = reader.await;
        }
        std::mem::take(&mut *self.output.lock())
    }
}

#[async_trait]
impl ExecHandle for ProcessHandle {
    async fn poll(&mut self) -> Result<Option<ExecExit>, DaemonError> {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                let output = self.drain_output().await;
                Ok(Some(ExecExit {
                    code: status.code(),
                    output,
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DaemonError::Io(e)),
        }
    }

    async fn kill(&mut self) -> Result<(), DaemonError> {
        self.child.start_kill().map_err(DaemonError::Io)?;
        let _ = self.child.wait().await;
        Ok(())
    }
}

// --- inline spawner ---

/// Runs the executor as an in-process task. Deterministic tests drive the
/// worker loop against a shared [`gantry_storage::MemStore`] this way.
pub struct InlineSpawner<C: Clock + 'static> {
    queue: Queue<C>,
}

impl<C: Clock + 'static> InlineSpawner<C> {
    pub fn new(queue: Queue<C>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl<C: Clock + 'static> ExecSpawner for InlineSpawner<C> {
    async fn spawn(&self, job: &JobRecord) -> Result<Box<dyn ExecHandle>, DaemonError> {
        let queue = self.queue.clone();
        let id = job.id;
        let task = tokio::spawn(async move { gantry_queue::run_job(&queue, id).await });
        Ok(Box::new(InlineHandle {
            id,
            task: Some(task),
        }))
    }
}

struct InlineHandle {
    id: JobId,
    task: Option<JoinHandle<Result<(), gantry_queue::QueueError>>>,
}

#[async_trait]
impl ExecHandle for InlineHandle {
    async fn poll(&mut self) -> Result<Option<ExecExit>, DaemonError> {
        let finished = self.task.as_ref().is_some_and(|t| t.is_finished());
        if !finished {
            return Ok(None);
        }
        let Some(task) = self.task.take() else {
            return Ok(None);
        };
        let code = match task.await {
            Ok(Ok(())) => Some(0),
            Ok(Err(e)) => {
                tracing::warn!(job_id = %self.id, error = %e, "inline executor failed");
                Some(1)
            }
            Err(_) => None, // aborted or panicked
        };
        Ok(Some(ExecExit {
            code,
            output: String::new(),
        }))
    }

    async fn kill(&mut self) -> Result<(), DaemonError> {
        if let Some(task) = &self.task {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;

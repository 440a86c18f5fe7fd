// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon launchers and the hidden executor mode.

use std::io::Read;
use std::sync::Arc;

use anyhow::Result;
use gantry_core::{daemon_identifier, Config, DaemonKind, JobId};
use gantry_daemon::{logging, AppDaemon, ProcessSpawner, Scheduler, Worker};
use tracing::info;

use crate::build_queue;
use crate::exit_error::ExitError;

/// `--worker [IDENTIFIER]`
pub async fn worker(config: &Config, name: Option<&str>) -> Result<()> {
    let identifier = daemon_identifier(DaemonKind::Worker, name);
    let _log_guard = logging::setup_logging(config, &identifier)?;
    let queue = build_queue(config, identifier.clone())?;

    println!("start worker [{}]", identifier);
    let spawner = Arc::new(ProcessSpawner::from_current_exe()?);
    let worker = Worker::new(queue, spawner).await?;
    worker.run().await?;
    Ok(())
}

/// `--scheduler [IDENTIFIER]`
pub async fn scheduler(config: &Config, name: Option<&str>) -> Result<()> {
    let identifier = daemon_identifier(DaemonKind::Scheduler, name);
    let _log_guard = logging::setup_logging(config, &identifier)?;
    let queue = build_queue(config, identifier.clone())?;

    println!("start scheduler [{}]", identifier);
    let scheduler = Scheduler::new(queue).await?;
    scheduler.run().await?;
    Ok(())
}

/// Options accepted by `--application`; the serving stack consumes them.
#[derive(Debug, Default)]
pub struct AppOptions {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub routing: Option<String>,
    pub filters: Vec<String>,
}

/// `--application [IDENTIFIER]`: registry presence for an API server
/// process. Request routing itself is wired up by the serving stack.
pub async fn application(config: &Config, name: Option<&str>, opts: AppOptions) -> Result<()> {
    let identifier = daemon_identifier(DaemonKind::App, name);
    let _log_guard = logging::setup_logging(config, &identifier)?;
    let queue = build_queue(config, identifier.clone())?;

    println!("start application [{}]", identifier);
    let port = opts.port.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
    info!(
        address = opts.address.as_deref().unwrap_or("-"),
        port = %port,
        routing = opts.routing.as_deref().unwrap_or("-"),
        filters = opts.filters.len(),
        "application options"
    );
    let app = AppDaemon::new(queue).await?;
    app.run().await?;
    Ok(())
}

/// Hidden `--execute`: the executor half of the worker/executor pair.
/// Reads one job id from stdin, runs the job, reports the terminal state.
pub async fn execute(config: &Config) -> Result<()> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let token = input.trim();

    let Some(id) = JobId::parse(token) else {
        eprintln!("invalid job id on stdin: {:?}", token);
        return Err(ExitError::code(1).into());
    };

    let identifier = format!("executor:{}", id);
    let queue = build_queue(config, identifier)?;
    gantry_queue::run_job(&queue, id).await?;
    Ok(())
}

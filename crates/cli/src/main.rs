// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! gantry - distributed job queue control utility.
//!
//! One binary, mutually exclusive long-flag commands: queue operations
//! (enqueue, listing, detail, remove/restart/kill), maintenance toggles,
//! and the daemon launchers (worker, scheduler, application, plus the
//! hidden executor mode workers fork).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod exit_error;
mod jobs;
mod kv;
mod output;
mod table;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use gantry_core::{local_hostname, Config, Context, Registry, SystemClock};
use gantry_queue::Queue;
use gantry_storage::FileStore;

use crate::exit_error::ExitError;

#[derive(Parser, Debug)]
#[command(
    name = "gantry",
    version,
    about = "gantry - distributed job queue control",
    after_help = "Exactly one command flag must be given."
)]
struct Cli {
    /// Set the global halt flag
    #[arg(long, short = 'x', group = "cmd")]
    halt: bool,

    /// Launch a worker daemon: [IDENTIFIER]
    #[arg(long, short = 'w', group = "cmd")]
    worker: bool,

    /// Launch the scheduler daemon: [IDENTIFIER]
    #[arg(long, short = 's', group = "cmd")]
    scheduler: bool,

    /// Launch an API server daemon: [IDENTIFIER]
    #[arg(long, group = "cmd")]
    application: bool,

    /// Enqueue a job: QUAL_NAME [K=V ...]
    #[arg(long, short = 'e', group = "cmd")]
    enqueue: bool,

    /// Print the job state summary
    #[arg(long, short = 'i', group = "cmd")]
    info: bool,

    /// Print the job listing: [STATE ...]
    #[arg(long, short = 'l', group = "cmd")]
    listing: bool,

    /// Print job details and stdout: (ID|QUAL_NAME)...
    #[arg(long, short = 'd', group = "cmd")]
    detail: bool,

    /// Flag jobs for removal: (ID|QUAL_NAME)...
    #[arg(long, group = "cmd")]
    remove: bool,

    /// Archive and re-enqueue jobs: (ID|QUAL_NAME)...
    #[arg(long, group = "cmd")]
    restart: bool,

    /// Flag jobs for termination: (ID|QUAL_NAME)...
    #[arg(long, group = "cmd")]
    kill: bool,

    /// Enter maintenance: [PROJECT]
    #[arg(long, group = "cmd")]
    pause: bool,

    /// Leave maintenance: [PROJECT]
    #[arg(long, group = "cmd")]
    resume: bool,

    /// Print the maintenance status
    #[arg(long, group = "cmd")]
    mode: bool,

    /// Print the daemon table
    #[arg(long, short = 'a', group = "cmd")]
    alive: bool,

    /// Executor mode: run one job, id supplied on stdin
    #[arg(long, group = "cmd", hide = true)]
    execute: bool,

    /// API server bind address
    #[arg(long)]
    address: Option<String>,

    /// API server port
    #[arg(long)]
    port: Option<u16>,

    /// API server routing prefix
    #[arg(long)]
    routing: Option<String>,

    /// API server handler filter (repeatable)
    #[arg(long = "filter")]
    filters: Vec<String>,

    /// Positional arguments of the selected command
    args: Vec<String>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let code = e.downcast_ref::<ExitError>().map_or(1, |c| c.code);
        let msg = format_error(&e);
        if !msg.is_empty() {
            eprintln!("Error: {}", msg);
        }
        std::process::exit(code);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    if cli.halt {
        commands::maintenance::halt(&cli_queue(&config)?).await
    } else if cli.worker {
        commands::daemons::worker(&config, cli.args.first().map(String::as_str)).await
    } else if cli.scheduler {
        commands::daemons::scheduler(&config, cli.args.first().map(String::as_str)).await
    } else if cli.application {
        commands::daemons::application(
            &config,
            cli.args.first().map(String::as_str),
            commands::daemons::AppOptions {
                address: cli.address,
                port: cli.port,
                routing: cli.routing,
                filters: cli.filters,
            },
        )
        .await
    } else if cli.execute {
        commands::daemons::execute(&config).await
    } else if cli.enqueue {
        commands::enqueue::run(&cli_queue(&config)?, &cli.args).await
    } else if cli.info {
        commands::views::info(&cli_queue(&config)?).await
    } else if cli.listing {
        commands::views::listing(&cli_queue(&config)?, &cli.args).await
    } else if cli.detail {
        commands::views::detail(&cli_queue(&config)?, &cli.args).await
    } else if cli.remove {
        commands::admin::remove(&cli_queue(&config)?, &cli.args).await
    } else if cli.restart {
        commands::admin::restart(&cli_queue(&config)?, &cli.args).await
    } else if cli.kill {
        commands::admin::kill(&cli_queue(&config)?, &cli.args).await
    } else if cli.pause {
        commands::maintenance::pause(&cli_queue(&config)?, cli.args.first().map(String::as_str))
            .await
    } else if cli.resume {
        commands::maintenance::resume(&cli_queue(&config)?, cli.args.first().map(String::as_str))
            .await
    } else if cli.mode {
        commands::maintenance::mode(&cli_queue(&config)?).await
    } else if cli.alive {
        commands::views::alive(&cli_queue(&config)?).await
    } else {
        eprintln!("nothing to do.");
        Err(ExitError::code(1).into())
    }
}

/// Queue handle for one-shot CLI operations.
fn cli_queue(config: &Config) -> Result<Queue<SystemClock>> {
    let identifier = format!("{}:cli:{}", local_hostname(), std::process::id());
    build_queue(config, identifier)
}

/// Open the shared store and assemble a queue service around it.
pub(crate) fn build_queue(config: &Config, identifier: String) -> Result<Queue<SystemClock>> {
    let store = Arc::new(FileStore::open(&config.store_path)?);
    let mut registry = Registry::new();
    jobs::register_builtin(&mut registry)?;
    Ok(Queue::new(
        store,
        Arc::new(registry),
        SystemClock,
        Context::new(identifier, config.clone()),
    ))
}

/// Format an anyhow error, deduplicating the chain.
///
/// If the top-level Display already contains every source message, the
/// "Caused by" chain would be noise; otherwise render it in full.
fn format_error(err: &anyhow::Error) -> String {
    let top = err.to_string();

    let chain_redundant = err
        .chain()
        .skip(1)
        .all(|cause| top.contains(&cause.to_string()));

    if chain_redundant {
        return top;
    }

    let mut buf = top;
    for (i, cause) in err.chain().skip(1).enumerate() {
        buf.push_str(&format!("\n\nCaused by:\n    {}: {}", i, cause));
    }
    buf
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

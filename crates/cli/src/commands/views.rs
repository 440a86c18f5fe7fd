// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only views: `--info`, `--listing`, `--detail`, `--alive`.

use anyhow::Result;
use gantry_core::{format_timestamp, JobState, SystemClock};
use gantry_queue::{Queue, QueueError};

use crate::exit_error::ExitError;
use crate::output;
use crate::table::{Column, Table};

/// `--info`: counts grouped by (state, flags, name).
pub async fn info(queue: &Queue<SystemClock>) -> Result<()> {
    let rows = queue.get_queue_state().await?;
    if rows.is_empty() {
        println!("no jobs.");
        return Ok(());
    }

    let mut table = Table::new(vec![
        Column::right("n"),
        Column::left("state"),
        Column::left("flag"),
        Column::left("name"),
    ]);
    for row in rows {
        table.row(vec![
            row.n.to_string(),
            row.state.to_string(),
            row.flags,
            row.name,
        ]);
    }
    print!("{}", table.render());
    Ok(())
}

/// `--listing [STATE ...]`: the job table, optionally filtered by state.
pub async fn listing(queue: &Queue<SystemClock>, state_args: &[String]) -> Result<()> {
    let mut states = Vec::new();
    for arg in state_args {
        match JobState::parse(arg) {
            Some(state) => {
                if !states.contains(&state) {
                    states.push(state);
                }
            }
            None => {
                eprintln!("unknown state [{}]", arg);
                return Err(ExitError::code(1).into());
            }
        }
    }
    let filter = if states.is_empty() {
        None
    } else {
        Some(states.as_slice())
    };

    let jobs = queue.get_job_listing(filter, None).await?;
    if jobs.is_empty() {
        println!("no jobs.");
        return Ok(());
    }

    let now = queue.now_ms();
    let mut table = Table::new(vec![
        Column::left("_id"),
        Column::left("state"),
        Column::left("flag"),
        Column::right("prog"),
        Column::right("prio"),
        Column::right("attempt"),
        Column::left("user"),
        Column::left("enqueued"),
        Column::right("age"),
        Column::right("runtime"),
        Column::left("worker"),
        Column::left("name"),
    ]);
    for job in jobs {
        table.row(vec![
            job.id.to_hex(),
            job.state.to_string(),
            job.flag_string(),
            output::format_progress(&job),
            output::format_priority(&job),
            output::format_attempts(&job),
            job.enqueued.username.clone(),
            format_timestamp(job.enqueued.at),
            output::format_age(now, job.enqueued.at),
            output::format_runtime(&job, now),
            output::format_worker(&job),
            job.name.clone(),
        ]);
    }
    print!("{}", table.render());
    Ok(())
}

/// `--detail (ID|QUAL_NAME)...`: full records plus captured stdout.
pub async fn detail(queue: &Queue<SystemClock>, tokens: &[String]) -> Result<()> {
    if tokens.is_empty() {
        eprintln!("detail requires a job id or name");
        return Err(ExitError::code(1).into());
    }

    for token in tokens {
        let ids = match queue.resolve_targets(token).await {
            Ok(ids) => ids,
            Err(QueueError::NotFound) => {
                eprintln!("no job matches [{}]", token);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        for id in ids {
            let job = queue.job_detail(&id).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
            println!("{}", "-".repeat(80));
            match queue.get_job_stdout(&id).await? {
                Some(stdout) => println!("STDOUT:\n{}", stdout),
                None => println!("STDOUT:\n(none)"),
            }
        }
    }
    Ok(())
}

/// `--alive`: the daemon table.
pub async fn alive(queue: &Queue<SystemClock>) -> Result<()> {
    let daemons = queue.get_daemon().await?;
    if daemons.is_empty() {
        println!("no daemon.");
        return Ok(());
    }

    let mut table = Table::new(vec![
        Column::right("loop"),
        Column::left("loop_time"),
        Column::left("heartbeat"),
        Column::left("phase"),
        Column::left("kind"),
        Column::left("_id"),
    ]);
    for daemon in daemons {
        table.row(vec![
            daemon.loop_count.to_string(),
            format_timestamp(daemon.loop_time),
            format_timestamp(daemon.heartbeat),
            daemon.phase.to_string(),
            daemon.kind.to_string(),
            daemon.id,
        ]);
    }
    print!("{}", table.render());
    Ok(())
}

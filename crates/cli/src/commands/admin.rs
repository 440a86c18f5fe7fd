// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Administrative flows: `--remove`, `--restart`, `--kill`.
//!
//! Tokens may be job ids, id prefixes, or qual-names; names fan out to
//! every matching non-terminal job. Failures go to stderr per id; the
//! command itself still exits 0.

use std::collections::BTreeSet;

use anyhow::Result;
use gantry_core::{JobId, SystemClock};
use gantry_queue::{Queue, QueueError};

use crate::exit_error::ExitError;

async fn resolve_all(
    queue: &Queue<SystemClock>,
    tokens: &[String],
) -> Result<BTreeSet<JobId>> {
    let mut ids = BTreeSet::new();
    for token in tokens {
        match queue.resolve_targets(token).await {
            Ok(found) => ids.extend(found),
            Err(QueueError::NotFound) => eprintln!("no job matches [{}]", token),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(ids)
}

fn require_tokens(tokens: &[String], what: &str) -> Result<()> {
    if tokens.is_empty() {
        eprintln!("{} requires a job id or name", what);
        return Err(ExitError::code(1).into());
    }
    Ok(())
}

pub async fn remove(queue: &Queue<SystemClock>, tokens: &[String]) -> Result<()> {
    require_tokens(tokens, "remove")?;
    for id in resolve_all(queue, tokens).await? {
        match queue.remove_job(&id).await {
            Ok(()) => println!("removed [{}]", id),
            Err(e) => eprintln!("failed to remove [{}]: {}", id, e),
        }
    }
    Ok(())
}

pub async fn restart(queue: &Queue<SystemClock>, tokens: &[String]) -> Result<()> {
    require_tokens(tokens, "restart")?;
    for id in resolve_all(queue, tokens).await? {
        match queue.restart_job(&id).await {
            Ok(new_id) => println!("restarted [{}], new _id [{}]", id, new_id),
            Err(e) => eprintln!("failed to restart [{}]: {}", id, e),
        }
    }
    Ok(())
}

pub async fn kill(queue: &Queue<SystemClock>, tokens: &[String]) -> Result<()> {
    require_tokens(tokens, "kill")?;
    for id in resolve_all(queue, tokens).await? {
        match queue.kill_job(&id).await {
            Ok(()) => println!("killed [{}]", id),
            Err(e) => eprintln!("failed to kill [{}]: {}", id, e),
        }
    }
    Ok(())
}

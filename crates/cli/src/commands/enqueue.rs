// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `--enqueue QUAL_NAME [K=V ...]`

use anyhow::Result;
use gantry_core::SystemClock;
use gantry_queue::{EnqueueOptions, Queue};

use crate::exit_error::ExitError;
use crate::kv;

pub async fn run(queue: &Queue<SystemClock>, args: &[String]) -> Result<()> {
    let Some(name) = args.first() else {
        eprintln!("enqueue requires a job name");
        return Err(ExitError::code(1).into());
    };
    println!("enqueueing [{}]", name);

    let job_args = match kv::parse_args(&args[1..]) {
        Ok(map) => map,
        Err(e) => {
            eprintln!("{}", e);
            return Err(ExitError::code(1).into());
        }
    };

    match queue.enqueue(name, job_args, EnqueueOptions::default()).await {
        Ok(job) => {
            println!("{}", job.id);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e);
            Err(ExitError::code(1).into())
        }
    }
}

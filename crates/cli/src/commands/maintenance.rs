// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maintenance and halt controls: `--pause`, `--resume`, `--mode`, `--halt`.

use anyhow::Result;
use gantry_core::SystemClock;
use gantry_queue::Queue;

fn project_suffix(project: Option<&str>) -> String {
    match project {
        Some(p) => format!(" on [{}]", p),
        None => String::new(),
    }
}

pub async fn pause(queue: &Queue<SystemClock>, project: Option<&str>) -> Result<()> {
    if queue.maintenance(project).await? {
        println!("in maintenance already,\nnothing to do{}", project_suffix(project));
    } else {
        queue.enter_maintenance(project).await?;
        println!("entering maintenance{}", project_suffix(project));
    }
    Ok(())
}

pub async fn resume(queue: &Queue<SystemClock>, project: Option<&str>) -> Result<()> {
    if queue.maintenance(project).await? {
        queue.leave_maintenance(project).await?;
        println!("leaving maintenance{}", project_suffix(project));
    } else {
        println!("not in maintenance,\nnothing to do{}", project_suffix(project));
    }
    Ok(())
}

pub async fn mode(queue: &Queue<SystemClock>) -> Result<()> {
    println!("global maintenance:");
    println!("  {}", queue.maintenance(None).await?);
    let projects = queue.maintenance_projects().await?;
    if !projects.is_empty() {
        println!("project maintenance:");
        for project in projects {
            println!("  {}", project);
        }
    }
    Ok(())
}

pub async fn halt(queue: &Queue<SystemClock>) -> Result<()> {
    println!("system halt");
    queue.halt().await?;
    Ok(())
}

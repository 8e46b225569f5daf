// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod logging;
pub mod services;
pub mod store;
pub mod tasks;
pub mod types;

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::JobFile;
use crate::config::loader::load_and_validate;
use crate::engine::{Engine, Job};
use crate::graph::DagGraph;
use crate::store::{JsonFileStore, TaskStore};

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Plan { config } => {
            let file = load_and_validate(&config)?;
            print!("{}", render_plan(&file)?);
            debug!("plan complete (nothing persisted)");
        }
        Command::Create { config, store } => {
            let file = load_and_validate(&config)?;
            create_job(&file, &store).await?;
            println!("{}", file.job.id);
        }
        Command::Status { job, store } => {
            let engine = Engine::new(Arc::new(JsonFileStore::new(store)));
            let report = tasks::job_report(&engine, &Job::new(job)).await?;
            info!(
                job_id = %report.job_id,
                tasks = report.tasks.len(),
                done = report.is_done(),
                "status reported"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

/// Persist the job file's graph into a store rooted at `store_dir`.
pub async fn create_job(file: &JobFile, store_dir: &Path) -> Result<()> {
    let graph = tasks::create_graph(file);
    let vertices = graph.vertices.len();
    JsonFileStore::new(store_dir)
        .populate(&file.job.id, graph)
        .await?;
    info!(job_id = %file.job.id, vertices, store = %store_dir.display(), "job created");
    Ok(())
}

/// Human-readable listing of the job's tasks in evaluation order.
pub fn render_plan(file: &JobFile) -> Result<String> {
    let tasks = tasks::create_graph(file).into_tasks();
    let dag = DagGraph::from_tasks(&tasks);
    let order = dag.evaluation_order()?;

    let mut out = String::new();
    writeln!(out, "trygraph plan for job {}", file.job.id)?;
    writeln!(
        out,
        "  engine: max_passes={} commit_attempts={} call_timeout_secs={}",
        file.engine.max_passes, file.engine.commit_attempts, file.engine.call_timeout_secs
    )?;
    writeln!(out)?;
    writeln!(out, "tasks ({}):", order.len())?;
    for id in &order {
        writeln!(out, "  - {id}")?;
        let deps = dag.dependencies_of(id);
        if !deps.is_empty() {
            writeln!(out, "      after: {deps:?}")?;
        }
    }
    Ok(out)
}

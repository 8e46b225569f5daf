// src/tasks/mod.rs

//! Task types and their registration table.

pub mod find_isolate;
pub mod serializer;

use crate::config::JobFile;
use crate::engine::{DispatchByTaskType, Job};
use crate::graph::{FIND_ISOLATE, RUN_TEST, TaskGraph};
use crate::services::Services;

pub use serializer::{JobReport, TaskReport, job_report, serializer, status_report};

/// Evaluators of every known task type, built once per job.
pub fn job_evaluator(job: &Job, services: &Services) -> DispatchByTaskType {
    DispatchByTaskType::new()
        .register(FIND_ISOLATE, find_isolate::evaluator(job, services))
        .register(RUN_TEST, run_test::evaluator(job, services))
}

/// Graph described by a job file: a test graph when `[test]` is present,
/// otherwise just the build.
pub fn create_graph(file: &JobFile) -> TaskGraph {
    match &file.test {
        Some(test) => run_test::create_graph(test),
        None => find_isolate::create_graph(&file.build),
    }
}

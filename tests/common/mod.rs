#![allow(dead_code, unused_imports)]

pub use trygraph_test_utils::builders;
pub use trygraph_test_utils::harness::Harness;
pub use trygraph_test_utils::{init_tracing, with_timeout};

use trygraph::graph::Task;
use trygraph::types::TaskStatus;
use trygraph::tasks::{find_isolate, run_test};

pub fn build_task_id() -> String {
    find_isolate::task_id(&builders::change())
}

pub fn test_task_id(attempt: u32) -> String {
    run_test::task_id(&builders::change(), attempt)
}

pub fn error_reasons(task: &Task) -> Vec<String> {
    task.payload
        .errors()
        .iter()
        .map(|e| e.reason.clone())
        .collect()
}

pub fn assert_status(task: &Task, expected: TaskStatus) {
    assert_eq!(
        task.status, expected,
        "task {} has status {} (errors: {:?})",
        task.id,
        task.status,
        task.payload.errors()
    );
}

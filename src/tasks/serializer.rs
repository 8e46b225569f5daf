// src/tasks/serializer.rs

//! Read-only status projection of a job's tasks.

use serde::Serialize;

use crate::engine::{
    DispatchByTaskType, Detail, Engine, Event, Filtering, Job, PayloadLifting, Sequence,
    StatusReport, TaskTypeEq,
};
use crate::errors::Result;
use crate::graph::{Change, FIND_ISOLATE, RUN_TEST, Task, TaskPayload};
use crate::tasks::{find_isolate, run_test};
use crate::types::{JobId, TaskId, TaskStatus};

/// Report for `task` with the given details.
///
/// `completed` is set for every terminal status; the exception lists the
/// recorded error reasons in order.
pub fn status_report(task: &Task, details: Vec<Detail>) -> StatusReport {
    let reasons: Vec<&str> = task
        .payload
        .errors()
        .iter()
        .map(|e| e.reason.as_str())
        .collect();

    StatusReport {
        completed: task.status.is_terminal(),
        exception: (!reasons.is_empty()).then(|| reasons.join(", ")),
        details,
    }
}

/// Evaluator writing a [`StatusReport`] for every task it knows.
pub fn serializer() -> Sequence {
    Sequence::new().then(PayloadLifting::new()).then(
        DispatchByTaskType::new()
            .register(
                FIND_ISOLATE,
                Filtering::new(TaskTypeEq(FIND_ISOLATE), find_isolate::serialize),
            )
            .register(
                RUN_TEST,
                Filtering::new(TaskTypeEq(RUN_TEST), run_test::serialize),
            ),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub quest: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    pub change: Change,
    pub status: TaskStatus,
    pub report: StatusReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub tasks: Vec<TaskReport>,
}

impl JobReport {
    /// Every task finished.
    pub fn is_done(&self) -> bool {
        self.tasks.iter().all(|t| t.report.completed)
    }
}

/// Status of every task of `job`, in evaluation order.
pub async fn job_report(engine: &Engine, job: &Job) -> Result<JobReport> {
    let accumulator = engine.evaluate(job, &Event::select(), &serializer()).await?;

    let tasks = accumulator
        .iter()
        .filter_map(|(task_id, result)| {
            let payload = result.payload.as_ref()?;
            let (quest, index) = match payload {
                TaskPayload::FindIsolate(_) => ("Build", None),
                TaskPayload::RunTest(test) => ("Test", Some(test.index)),
            };
            Some(TaskReport {
                task_id: task_id.to_string(),
                quest,
                index,
                change: payload.change().clone(),
                status: result.status.unwrap_or_default(),
                report: result.report.clone().unwrap_or_default(),
            })
        })
        .collect();

    Ok(JobReport {
        job_id: job.id.clone(),
        tasks,
    })
}

// src/store/mod.rs

//! Persistence boundary for job graphs.
//!
//! A [`TaskStore`] persists each job's tasks and provides the atomic,
//! per-task compare-and-set [`TaskStore::update_task`] every action writes
//! through. [`memory`] and [`file`] are the bundled implementations;
//! [`commit`] layers the reload-and-retry loop on top.

pub mod commit;
pub mod file;
pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::model::check_acyclic;
use crate::graph::{Dependency, GraphError, Task, TaskGraph, TaskPayload, TaskVertex};
use crate::types::{BoxFuture, JobId, TaskId, TaskStatus};

pub use commit::{CommitOutcome, commit_with_retry};
pub use file::JsonFileStore;
pub use memory::InMemoryTaskStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("job '{0}' not found")]
    JobNotFound(JobId),

    #[error("job '{0}' already exists")]
    JobExists(JobId),

    #[error("task '{task_id}' not found in job '{job_id}'")]
    TaskNotFound { job_id: JobId, task_id: TaskId },

    #[error("task '{task_id}' changed concurrently (expected revision {expected}, found {actual})")]
    Conflict {
        task_id: TaskId,
        expected: u64,
        actual: u64,
    },

    #[error("task '{task_id}' cannot move from {from} to {to}")]
    InvalidTransition {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("update for task '{0}' carries neither status nor payload")]
    EmptyUpdate(TaskId),

    #[error("payload type {found} does not match task '{task_id}' of type {expected}")]
    PayloadTypeMismatch {
        task_id: TaskId,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid graph amendment: {0}")]
    InvalidAmendment(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// One atomic write to a task.
///
/// `payload` replaces the whole payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskUpdate {
    pub task_id: TaskId,
    pub expected_revision: u64,
    pub status: Option<TaskStatus>,
    pub payload: Option<TaskPayload>,
}

impl TaskUpdate {
    pub fn new(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            expected_revision: task.revision,
            status: None,
            payload: None,
        }
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn payload(mut self, payload: TaskPayload) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Persistence contract for job graphs.
pub trait TaskStore: Send + Sync {
    /// Persist a freshly created graph; every task starts `pending`.
    fn populate<'a>(&'a self, job_id: &'a str, graph: TaskGraph)
    -> BoxFuture<'a, Result<(), StoreError>>;

    /// Add vertices and edges to an existing graph.
    fn extend<'a>(
        &'a self,
        job_id: &'a str,
        vertices: Vec<TaskVertex>,
        edges: Vec<Dependency>,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// All tasks of a job in insertion order.
    fn load_graph<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<Vec<Task>, StoreError>>;

    fn load_task<'a>(
        &'a self,
        job_id: &'a str,
        task_id: &'a str,
    ) -> BoxFuture<'a, Result<Task, StoreError>>;

    /// Compare-and-set write; returns the task as persisted.
    fn update_task<'a>(
        &'a self,
        job_id: &'a str,
        update: TaskUpdate,
    ) -> BoxFuture<'a, Result<Task, StoreError>>;
}

/// Serialized form of one job's tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredJob {
    pub tasks: Vec<Task>,
}

impl StoredJob {
    pub fn from_graph(graph: TaskGraph) -> Result<Self, StoreError> {
        graph.validate()?;
        Ok(Self {
            tasks: graph.into_tasks(),
        })
    }

    /// Apply an amendment; on error `self` is unchanged.
    pub fn extend(
        &mut self,
        vertices: Vec<TaskVertex>,
        edges: Vec<Dependency>,
    ) -> Result<(), StoreError> {
        for vertex in &vertices {
            if self.tasks.iter().any(|t| t.id == vertex.id) {
                return Err(StoreError::InvalidAmendment(format!(
                    "task '{}' already exists",
                    vertex.id
                )));
            }
        }
        for edge in &edges {
            let known = |id: &str| {
                self.tasks.iter().any(|t| t.id == id) || vertices.iter().any(|v| v.id == id)
            };
            if !known(&edge.from) {
                return Err(StoreError::InvalidAmendment(format!(
                    "dependency source '{}' is in neither graph",
                    edge.from
                )));
            }
        }

        let mut tasks = self.tasks.clone();
        tasks.extend(TaskGraph::new(vertices, Vec::new()).into_tasks());

        for edge in edges {
            if let Some(task) = tasks.iter_mut().find(|t| t.id == edge.from) {
                if !task.dependencies.contains(&edge.to) {
                    task.dependencies.push(edge.to);
                    task.revision += 1;
                }
            }
        }

        check_acyclic(
            tasks.iter().map(|t| t.id.as_str()),
            tasks.iter().flat_map(|t| {
                t.dependencies
                    .iter()
                    .map(move |d| (t.id.as_str(), d.as_str()))
            }),
        )?;

        self.tasks = tasks;
        Ok(())
    }

    pub fn task(&self, job_id: &str, task_id: &str) -> Result<&Task, StoreError> {
        self.tasks
            .iter()
            .find(|t| t.id == task_id)
            .ok_or_else(|| StoreError::TaskNotFound {
                job_id: job_id.to_string(),
                task_id: task_id.to_string(),
            })
    }

    /// Validate and apply one compare-and-set update.
    pub fn apply(&mut self, job_id: &str, update: TaskUpdate) -> Result<Task, StoreError> {
        if update.status.is_none() && update.payload.is_none() {
            return Err(StoreError::EmptyUpdate(update.task_id));
        }

        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == update.task_id)
            .ok_or_else(|| StoreError::TaskNotFound {
                job_id: job_id.to_string(),
                task_id: update.task_id.clone(),
            })?;

        if task.revision != update.expected_revision {
            return Err(StoreError::Conflict {
                task_id: task.id.clone(),
                expected: update.expected_revision,
                actual: task.revision,
            });
        }

        if let Some(next) = update.status {
            if !task.status.can_transition_to(next) {
                return Err(StoreError::InvalidTransition {
                    task_id: task.id.clone(),
                    from: task.status,
                    to: next,
                });
            }
        }

        if let Some(payload) = &update.payload {
            if payload.task_type() != task.task_type() {
                return Err(StoreError::PayloadTypeMismatch {
                    task_id: task.id.clone(),
                    expected: task.task_type(),
                    found: payload.task_type(),
                });
            }
        }

        if let Some(next) = update.status {
            task.status = next;
        }
        if let Some(payload) = update.payload {
            task.payload = payload;
        }
        task.revision += 1;
        Ok(task.clone())
    }
}

// src/engine/action.rs

//! Deferred side effects.
//!
//! Evaluators return [`Action`]s; the engine executes them after the
//! traversal, each wrapped in [`FailureIsolated`] so one failing action
//! only fails its own task.

use std::fmt;

use thiserror::Error;
use tracing::{error, info};

use crate::graph::TaskError;
use crate::services::ServiceError;
use crate::store::{CommitOutcome, StoreError, TaskStore, commit_with_retry};
use crate::types::{BoxFuture, JobId, TaskId, TaskStatus};

#[derive(Error, Debug)]
pub enum ActionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("{message}")]
    Other { reason: String, message: String },
}

impl ActionError {
    pub fn other(reason: impl Into<String>, message: impl Into<String>) -> Self {
        ActionError::Other {
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Reason recorded on the task when this error is isolated.
    pub fn reason(&self) -> String {
        match self {
            ActionError::Store(_) => "StoreError".to_string(),
            ActionError::Service(e) => e.kind().to_string(),
            ActionError::Other { reason, .. } => reason.clone(),
        }
    }
}

/// A deferred operation bound to one task of one job.
///
/// Implementations capture immutable snapshots at evaluation time and write
/// task state only through the store.
pub trait Action: Send + Sync + fmt::Display {
    fn job_id(&self) -> &str;
    fn task_id(&self) -> &str;
    fn execute<'a>(&'a self, store: &'a dyn TaskStore) -> BoxFuture<'a, Result<(), ActionError>>;
}

/// Runs an action and turns any error into a recorded task failure.
pub struct FailureIsolated<'a> {
    inner: &'a dyn Action,
    commit_attempts: u32,
}

impl<'a> FailureIsolated<'a> {
    pub fn new(inner: &'a dyn Action, commit_attempts: u32) -> Self {
        Self {
            inner,
            commit_attempts,
        }
    }

    /// Execute the wrapped action; never fails.
    pub async fn run(&self, store: &dyn TaskStore) {
        let Err(err) = self.inner.execute(store).await else {
            return;
        };

        let job_id = self.inner.job_id();
        let task_id = self.inner.task_id();
        error!(
            job_id,
            task = task_id,
            action = %self.inner,
            reason = %err.reason(),
            error = %err,
            "action failed; marking task failed"
        );

        let record = TaskError::with_reason(err.reason(), err.to_string());
        let committed = commit_with_retry(store, job_id, task_id, self.commit_attempts, |task| {
            let mut payload = task.payload.clone();
            payload.push_error(record.clone());
            let status = (!task.status.is_terminal()).then_some(TaskStatus::Failed);
            Some((status, Some(payload)))
        })
        .await;

        if let Err(store_err) = committed {
            error!(
                job_id,
                task = task_id,
                error = %store_err,
                "could not record action failure"
            );
        }
    }
}

/// Fail a task with a classified error decided at evaluation time.
#[derive(Debug, Clone)]
pub struct MarkFailed {
    pub job_id: JobId,
    pub task_id: TaskId,
    pub error: TaskError,
    pub commit_attempts: u32,
}

impl fmt::Display for MarkFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MarkFailed({}, {})", self.task_id, self.error.reason)
    }
}

impl Action for MarkFailed {
    fn job_id(&self) -> &str {
        &self.job_id
    }

    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn execute<'a>(&'a self, store: &'a dyn TaskStore) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move {
            let outcome =
                commit_with_retry(store, &self.job_id, &self.task_id, self.commit_attempts, |task| {
                    if task.status.is_terminal() {
                        return None;
                    }
                    let mut payload = task.payload.clone();
                    payload.push_error(self.error.clone());
                    Some((Some(TaskStatus::Failed), Some(payload)))
                })
                .await?;

            if let CommitOutcome::Applied(_) = outcome {
                info!(
                    job_id = %self.job_id,
                    task = %self.task_id,
                    reason = %self.error.reason,
                    "task failed"
                );
            }
            Ok(())
        })
    }
}

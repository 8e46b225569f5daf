// src/store/commit.rs

use tracing::{debug, warn};

use crate::graph::{Task, TaskPayload};
use crate::store::{StoreError, TaskStore, TaskUpdate};
use crate::types::TaskStatus;

/// Result of [`commit_with_retry`].
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// The write went through; carries the task as persisted.
    Applied(Task),
    /// The mutation declined to write against the fresh state.
    Skipped,
}

impl CommitOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CommitOutcome::Applied(_))
    }
}

/// Reload `task_id`, let `mutate` compute the new status and whole payload
/// from the fresh state, and write it with the fresh revision.
///
/// `mutate` returning `None` skips the write. A payload-only change equal to
/// the stored payload is skipped too. Revision conflicts are retried up to
/// `attempts` times; the last conflict is returned when they run out.
pub async fn commit_with_retry<F>(
    store: &dyn TaskStore,
    job_id: &str,
    task_id: &str,
    attempts: u32,
    mutate: F,
) -> Result<CommitOutcome, StoreError>
where
    F: Fn(&Task) -> Option<(Option<TaskStatus>, Option<TaskPayload>)>,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let fresh = store.load_task(job_id, task_id).await?;

        let Some((status, payload)) = mutate(&fresh) else {
            debug!(job_id, task = task_id, "commit skipped by precondition");
            return Ok(CommitOutcome::Skipped);
        };

        let status = status.filter(|s| !(*s == fresh.status && *s != TaskStatus::Ongoing));
        let payload = payload.filter(|p| *p != fresh.payload);
        if status.is_none() && payload.is_none() {
            return Ok(CommitOutcome::Skipped);
        }

        let mut update = TaskUpdate::new(&fresh);
        update.status = status;
        update.payload = payload;

        match store.update_task(job_id, update).await {
            Ok(task) => return Ok(CommitOutcome::Applied(task)),
            Err(e) if e.is_conflict() && attempt < attempts => {
                warn!(job_id, task = task_id, attempt, "task changed concurrently; retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

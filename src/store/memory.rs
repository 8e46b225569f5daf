// src/store/memory.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::graph::{Dependency, Task, TaskGraph, TaskVertex};
use crate::store::{StoreError, StoredJob, TaskStore, TaskUpdate};
use crate::types::{BoxFuture, JobId};

/// Process-local [`TaskStore`]; every operation holds the lock only for the
/// duration of a synchronous map access.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    jobs: Arc<Mutex<HashMap<JobId, StoredJob>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_job<T>(
        &self,
        job_id: &str,
        f: impl FnOnce(&mut StoredJob) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;
        f(job)
    }
}

impl TaskStore for InMemoryTaskStore {
    fn populate<'a>(
        &'a self,
        job_id: &'a str,
        graph: TaskGraph,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let stored = StoredJob::from_graph(graph)?;
            let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
            if jobs.contains_key(job_id) {
                return Err(StoreError::JobExists(job_id.to_string()));
            }
            debug!(job_id, tasks = stored.tasks.len(), "populated job graph");
            jobs.insert(job_id.to_string(), stored);
            Ok(())
        })
    }

    fn extend<'a>(
        &'a self,
        job_id: &'a str,
        vertices: Vec<TaskVertex>,
        edges: Vec<Dependency>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move { self.with_job(job_id, |job| job.extend(vertices, edges)) })
    }

    fn load_graph<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<Vec<Task>, StoreError>> {
        Box::pin(async move { self.with_job(job_id, |job| Ok(job.tasks.clone())) })
    }

    fn load_task<'a>(
        &'a self,
        job_id: &'a str,
        task_id: &'a str,
    ) -> BoxFuture<'a, Result<Task, StoreError>> {
        Box::pin(async move { self.with_job(job_id, |job| job.task(job_id, task_id).cloned()) })
    }

    fn update_task<'a>(
        &'a self,
        job_id: &'a str,
        update: TaskUpdate,
    ) -> BoxFuture<'a, Result<Task, StoreError>> {
        Box::pin(async move { self.with_job(job_id, |job| job.apply(job_id, update)) })
    }
}

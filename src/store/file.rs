// src/store/file.rs

//! Directory-backed [`TaskStore`]: one pretty-printed JSON document per job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::graph::{Dependency, Task, TaskGraph, TaskVertex};
use crate::store::{StoreError, StoredJob, TaskStore, TaskUpdate};
use crate::types::BoxFuture;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
    /// Serialises read-modify-write cycles within this process.
    lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn job_path(&self, job_id: &str) -> PathBuf {
        let file_name: String = job_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{file_name}.json"))
    }

    async fn read(&self, job_id: &str) -> Result<StoredJob, StoreError> {
        let path = self.job_path(job_id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::JobNotFound(job_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    async fn write(&self, job_id: &str, job: &StoredJob) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.job_path(job_id);
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(job)?;
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(job_id, path = %path.display(), "wrote job graph");
        Ok(())
    }
}

impl TaskStore for JsonFileStore {
    fn populate<'a>(
        &'a self,
        job_id: &'a str,
        graph: TaskGraph,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let stored = StoredJob::from_graph(graph)?;
            let _guard = self.lock.lock().await;
            if tokio::fs::try_exists(self.job_path(job_id)).await? {
                return Err(StoreError::JobExists(job_id.to_string()));
            }
            self.write(job_id, &stored).await
        })
    }

    fn extend<'a>(
        &'a self,
        job_id: &'a str,
        vertices: Vec<TaskVertex>,
        edges: Vec<Dependency>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut job = self.read(job_id).await?;
            job.extend(vertices, edges)?;
            self.write(job_id, &job).await
        })
    }

    fn load_graph<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<Vec<Task>, StoreError>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            Ok(self.read(job_id).await?.tasks)
        })
    }

    fn load_task<'a>(
        &'a self,
        job_id: &'a str,
        task_id: &'a str,
    ) -> BoxFuture<'a, Result<Task, StoreError>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let job = self.read(job_id).await?;
            job.task(job_id, task_id).cloned()
        })
    }

    fn update_task<'a>(
        &'a self,
        job_id: &'a str,
        update: TaskUpdate,
    ) -> BoxFuture<'a, Result<Task, StoreError>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut job = self.read(job_id).await?;
            let task = job.apply(job_id, update)?;
            self.write(job_id, &job).await?;
            Ok(task)
        })
    }
}

// src/engine/evaluate.rs

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::action::FailureIsolated;
use crate::engine::evaluators::{Actions, Evaluator};
use crate::engine::{Accumulator, Event};
use crate::errors::Result;
use crate::graph::{DagGraph, Task};
use crate::store::TaskStore;
use crate::types::{JobId, TaskStatus};

/// Run-scoped identity of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_mode: Option<String>,
}

impl Job {
    pub fn new(id: impl Into<JobId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Upper bound on traverse-then-execute passes per evaluation.
    pub max_passes: u32,
    /// Compare-and-set attempts used when recording isolated failures.
    pub commit_attempts: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_passes: crate::config::DEFAULT_MAX_PASSES,
            commit_attempts: crate::config::DEFAULT_COMMIT_ATTEMPTS,
        }
    }
}

/// Evaluates job graphs against events.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn TaskStore>,
    settings: EngineSettings,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Evaluate `job`'s graph against `event`.
    ///
    /// Each pass loads the graph, traverses it in dependency order and then
    /// executes the collected actions in order. Passes repeat while a batch
    /// changes some task's status, up to `max_passes`. The returned
    /// accumulator comes from a last traversal over the settled state; the
    /// actions that traversal yields are not executed.
    pub async fn evaluate(
        &self,
        job: &Job,
        event: &Event,
        evaluator: &dyn Evaluator,
    ) -> Result<Accumulator> {
        let mut tasks = self.store.load_graph(&job.id).await?;
        let mut pass = 0;

        loop {
            pass += 1;
            let (accumulator, actions) = traverse(&tasks, event, evaluator)?;
            debug!(
                job_id = %job.id,
                event_type = %event.event_type,
                pass,
                actions = actions.len(),
                "traversal complete"
            );

            if actions.is_empty() {
                return Ok(accumulator);
            }

            self.execute(actions).await;

            let reloaded = self.store.load_graph(&job.id).await?;
            let changed = status_changed(&tasks, &reloaded);
            tasks = reloaded;

            if !changed || pass >= self.settings.max_passes {
                if changed {
                    info!(job_id = %job.id, pass, "pass limit reached; stopping evaluation");
                }
                let (accumulator, pending) = traverse(&tasks, event, evaluator)?;
                debug!(
                    job_id = %job.id,
                    dropped = pending.len(),
                    "settled; returning final accumulator"
                );
                return Ok(accumulator);
            }
        }
    }

    async fn execute(&self, actions: Actions) {
        for action in &actions {
            debug!(
                job_id = action.job_id(),
                task = action.task_id(),
                action = %action,
                "executing action"
            );
            FailureIsolated::new(action.as_ref(), self.settings.commit_attempts)
                .run(self.store.as_ref())
                .await;
        }
    }
}

/// Visit tasks dependencies-first, collecting actions in visit order.
pub fn traverse(
    tasks: &[Task],
    event: &Event,
    evaluator: &dyn Evaluator,
) -> Result<(Accumulator, Actions)> {
    let order = DagGraph::from_tasks(tasks).evaluation_order()?;
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut accumulator = Accumulator::new();
    let mut actions: Actions = Vec::new();
    for id in &order {
        if let Some(task) = by_id.get(id.as_str()) {
            actions.extend(evaluator.evaluate(task, event, &mut accumulator));
        }
    }
    Ok((accumulator, actions))
}

fn status_changed(before: &[Task], after: &[Task]) -> bool {
    let previous: HashMap<&str, TaskStatus> =
        before.iter().map(|t| (t.id.as_str(), t.status)).collect();
    after
        .iter()
        .any(|t| previous.get(t.id.as_str()) != Some(&t.status))
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::*;
    use crate::engine::{Action, ActionError, PayloadLifting, Sequence};
    use crate::graph::{BuildPayload, Change, Commit, Dependency, TaskGraph, TaskPayload, TaskVertex};
    use crate::store::{InMemoryTaskStore, commit_with_retry};
    use crate::types::BoxFuture;

    struct Complete {
        task_id: String,
    }

    impl fmt::Display for Complete {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Complete({})", self.task_id)
        }
    }

    impl Action for Complete {
        fn job_id(&self) -> &str {
            "job"
        }

        fn task_id(&self) -> &str {
            &self.task_id
        }

        fn execute<'a>(
            &'a self,
            store: &'a dyn TaskStore,
        ) -> BoxFuture<'a, std::result::Result<(), ActionError>> {
            Box::pin(async move {
                commit_with_retry(store, "job", &self.task_id, 3, |_| {
                    Some((Some(TaskStatus::Completed), None))
                })
                .await?;
                Ok(())
            })
        }
    }

    /// Completes a pending task once all of its dependencies completed.
    fn complete_when_ready(task: &Task, _event: &Event, accumulator: &mut Accumulator) -> Actions {
        let ready = task
            .dependencies
            .iter()
            .all(|dep| accumulator.status_of(dep) == Some(TaskStatus::Completed));
        if task.status == TaskStatus::Pending && ready {
            vec![Box::new(Complete {
                task_id: task.id.clone(),
            })]
        } else {
            Vec::new()
        }
    }

    fn vertex(id: &str) -> TaskVertex {
        TaskVertex::new(
            id,
            TaskPayload::FindIsolate(BuildPayload::new(
                "builder",
                "target",
                "bucket",
                Change::from_commits([Commit::new("chromium", "abc")]),
            )),
        )
    }

    /// `c` depends on `b`, which depends on `a`.
    async fn chain() -> Arc<InMemoryTaskStore> {
        let store = Arc::new(InMemoryTaskStore::new());
        let graph = TaskGraph::new(
            vec![vertex("a"), vertex("b"), vertex("c")],
            vec![Dependency::new("b", "a"), Dependency::new("c", "b")],
        );
        store.populate("job", graph).await.unwrap();
        store
    }

    fn evaluator() -> Sequence {
        Sequence::new()
            .then(PayloadLifting::new())
            .then(complete_when_ready)
    }

    async fn status(store: &InMemoryTaskStore, id: &str) -> TaskStatus {
        store.load_task("job", id).await.unwrap().status
    }

    #[tokio::test]
    async fn passes_repeat_until_statuses_settle() {
        let store = chain().await;
        let engine = Engine::new(store.clone());

        let accumulator = engine
            .evaluate(&Job::new("job"), &Event::initiate(), &evaluator())
            .await
            .unwrap();

        for id in ["a", "b", "c"] {
            assert_eq!(status(&store, id).await, TaskStatus::Completed);
            assert_eq!(accumulator.status_of(id), Some(TaskStatus::Completed));
        }
    }

    #[tokio::test]
    async fn max_passes_stops_dependents_from_catching_up() {
        let store = chain().await;
        let engine = Engine::new(store.clone()).with_settings(EngineSettings {
            max_passes: 1,
            ..EngineSettings::default()
        });

        let accumulator = engine
            .evaluate(&Job::new("job"), &Event::initiate(), &evaluator())
            .await
            .unwrap();

        assert_eq!(status(&store, "a").await, TaskStatus::Completed);
        assert_eq!(status(&store, "b").await, TaskStatus::Pending);
        assert_eq!(status(&store, "c").await, TaskStatus::Pending);
        // The final traversal sees the settled state; its actions are dropped.
        assert_eq!(accumulator.status_of("a"), Some(TaskStatus::Completed));
        assert_eq!(accumulator.status_of("b"), Some(TaskStatus::Pending));
    }

    #[tokio::test]
    async fn two_passes_reach_the_second_level_only() {
        let store = chain().await;
        let engine = Engine::new(store.clone()).with_settings(EngineSettings {
            max_passes: 2,
            ..EngineSettings::default()
        });

        engine
            .evaluate(&Job::new("job"), &Event::initiate(), &evaluator())
            .await
            .unwrap();

        assert_eq!(status(&store, "b").await, TaskStatus::Completed);
        assert_eq!(status(&store, "c").await, TaskStatus::Pending);
    }
}

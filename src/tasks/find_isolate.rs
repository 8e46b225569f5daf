// src/tasks/find_isolate.rs

//! Build acquisition.
//!
//! A `find_isolate` task resolves the build artifact (isolate) for a change:
//! straight from the isolate cache when a previous build produced it,
//! otherwise by requesting a build and following its status until the build
//! output can be read from the result details.

use std::fmt;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::all_of;
use crate::engine::{
    Accumulator, Action, ActionError, Actions, Detail, DispatchByEventType, Event, Evaluator,
    Filtering, INITIATE, Job, MarkFailed, PayloadLifting, Sequence, TaskIsEventTarget,
    TaskStatusIn, TaskTypeEq, UPDATE, not,
};
use crate::graph::{
    BuildPayload, Change, ErrorReason, FIND_ISOLATE, Task, TaskError, TaskGraph, TaskPayload,
    TaskVertex,
};
use crate::services::{
    BuildHandle, BuildRequest, BuildResult, BuildState, BuildStatus, Isolate, IsolateKey, Services,
};
use crate::store::{CommitOutcome, TaskStore, commit_with_retry};
use crate::tasks::serializer::status_report;
use crate::types::{BoxFuture, JobId, TaskId, TaskStatus};

/// Inputs of a build-acquisition graph.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOptions {
    pub builder: String,
    pub target: String,
    pub bucket: String,
    pub change: Change,
}

pub fn task_id(change: &Change) -> TaskId {
    format!("{FIND_ISOLATE}_{}", change.id())
}

/// Single-vertex graph for one change.
pub fn create_graph(options: &TaskOptions) -> TaskGraph {
    TaskGraph::new(
        vec![TaskVertex::new(
            task_id(&options.change),
            TaskPayload::FindIsolate(BuildPayload::new(
                options.builder.clone(),
                options.target.clone(),
                options.bucket.clone(),
                options.change.clone(),
            )),
        )],
        Vec::new(),
    )
}

/// Tags attached to build requests so builds can be traced to a job.
pub fn build_tags(job: &Job) -> Vec<String> {
    vec![
        format!("pinpoint_job_id:{}", job.id),
        format!("pinpoint_user:{}", job.user),
        format!("pinpoint_url:{}", job.url),
    ]
}

/// How a build status maps onto the task.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    /// Not finished yet; keep polling.
    InProgress,
    Failed(TaskError),
    Cancelled(TaskError),
    Succeeded(Isolate),
}

/// Classify a build status for `target`.
pub fn classify_build(status: &BuildStatus, target: &str, change: &Change) -> BuildOutcome {
    if status.status != BuildState::Completed {
        return BuildOutcome::InProgress;
    }

    match status.result {
        Some(BuildResult::Success) => {}
        Some(BuildResult::Failure) => {
            return BuildOutcome::Failed(TaskError::new(
                ErrorReason::BuildFailed,
                format!("Build for {change} failed"),
            ));
        }
        Some(BuildResult::Canceled) => {
            return BuildOutcome::Cancelled(TaskError::new(
                ErrorReason::BuildCancelled,
                format!("Build for {change} was cancelled"),
            ));
        }
        Some(BuildResult::Unknown) | None => {
            return BuildOutcome::Failed(TaskError::new(
                ErrorReason::InvalidResponse,
                "Build completed without a recognised result",
            ));
        }
    }

    let not_found = |message: String| {
        BuildOutcome::Failed(TaskError::new(ErrorReason::BuildIsolateNotFound, message))
    };

    let Some(details) = status.result_details_json.as_deref() else {
        return not_found(format!("Could not find isolate for build at {change}"));
    };
    let details: Value = match serde_json::from_str(details) {
        Ok(details) => details,
        Err(e) => {
            return BuildOutcome::Failed(TaskError::new(
                ErrorReason::InvalidResponse,
                format!("Invalid JSON response: {e}"),
            ));
        }
    };
    let Some(properties) = details.get("properties").and_then(Value::as_object) else {
        return not_found(format!("Could not find result details for build at {change}"));
    };

    let isolate_server = properties.get("isolate_server").and_then(Value::as_str);
    let revision = properties.get("got_revision_cp").and_then(Value::as_str);
    let (Some(isolate_server), Some(revision)) = (isolate_server, revision) else {
        let missing: Vec<&str> = ["isolate_server", "got_revision_cp"]
            .into_iter()
            .filter(|key| properties.get(*key).and_then(Value::as_str).is_none())
            .collect();
        return not_found(format!(
            "Properties in result missing required data: {}",
            missing.join(", ")
        ));
    };

    let suffix = if properties.contains_key("patch_storage") {
        "with_patch"
    } else {
        "without_patch"
    };
    let key = format!("swarm_hashes_{}_{suffix}", revision.replace('@', "(at)"));

    match properties
        .get(&key)
        .and_then(|hashes| hashes.get(target))
        .and_then(Value::as_str)
    {
        Some(hash) => BuildOutcome::Succeeded(Isolate {
            server: isolate_server.to_string(),
            hash: hash.to_string(),
        }),
        None => not_found(format!("Could not find isolate for build at {change}")),
    }
}

/// Complete a task with an isolate found in the cache.
struct CompleteFromCache {
    job_id: JobId,
    task_id: TaskId,
    isolate: Isolate,
    commit_attempts: u32,
}

impl fmt::Display for CompleteFromCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompleteFromCache({})", self.task_id)
    }
}

impl Action for CompleteFromCache {
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
                    if task.status != TaskStatus::Pending {
                        return None;
                    }
                    let mut payload = task.payload.clone();
                    let build = payload.as_build_mut()?;
                    build.isolate_server = Some(self.isolate.server.clone());
                    build.isolate_hash = Some(self.isolate.hash.clone());
                    Some((Some(TaskStatus::Completed), Some(payload)))
                })
                .await?;

            if outcome.is_applied() {
                info!(
                    job_id = %self.job_id,
                    task = %self.task_id,
                    hash = %self.isolate.hash,
                    "completed from isolate cache"
                );
            }
            Ok(())
        })
    }
}

/// Request a build, then record it while the task is still where the
/// evaluator saw it.
struct ScheduleBuild {
    job_id: JobId,
    task_id: TaskId,
    /// Status the evaluator saw; the build is only recorded if it still holds.
    seen_status: TaskStatus,
    request: BuildRequest,
    services: Services,
}

impl fmt::Display for ScheduleBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScheduleBuild({}, builder={})", self.task_id, self.request.builder)
    }
}

impl Action for ScheduleBuild {
    fn job_id(&self) -> &str {
        &self.job_id
    }

    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn execute<'a>(&'a self, store: &'a dyn TaskStore) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move {
            let handle = self
                .services
                .bounded("build", self.services.builds.schedule_build(&self.request))
                .await?;
            info!(
                job_id = %self.job_id,
                task = %self.task_id,
                build = %handle.id,
                "build scheduled"
            );

            let attempts = self.services.commit_attempts;
            let recorded = commit_with_retry(store, &self.job_id, &self.task_id, attempts, |task| {
                if task.status != self.seen_status {
                    return None;
                }
                let mut payload = task.payload.clone();
                let build = payload.as_build_mut()?;
                build.tries += 1;
                build.build = Some(handle.clone());
                Some((Some(TaskStatus::Ongoing), Some(payload)))
            })
            .await?;

            if let CommitOutcome::Skipped = recorded {
                warn!(
                    job_id = %self.job_id,
                    task = %self.task_id,
                    build = %handle.id,
                    "task moved on before the build was recorded"
                );
            }
            Ok(())
        })
    }
}

/// Resolve the build status (pushed or polled) and apply it.
struct UpdateBuildStatus {
    job_id: JobId,
    task_id: TaskId,
    handle: Option<BuildHandle>,
    pushed: Option<BuildStatus>,
    key: IsolateKey,
    target: String,
    change: Change,
    services: Services,
}

impl fmt::Display for UpdateBuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.handle {
            Some(handle) => write!(f, "UpdateBuildStatus({}, build={})", self.task_id, handle.id),
            None => write!(f, "UpdateBuildStatus({})", self.task_id),
        }
    }
}

impl UpdateBuildStatus {
    async fn resolve(&self) -> Result<BuildStatus, ActionError> {
        if let Some(status) = &self.pushed {
            return Ok(status.clone());
        }
        let handle = self.handle.as_ref().ok_or_else(|| {
            ActionError::other(
                ErrorReason::MissingBuildDetails.as_str(),
                "No build details in attempt to update build status",
            )
        })?;
        Ok(self
            .services
            .bounded("build", self.services.builds.poll_build(handle))
            .await?)
    }
}

impl Action for UpdateBuildStatus {
    fn job_id(&self) -> &str {
        &self.job_id
    }

    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn execute<'a>(&'a self, store: &'a dyn TaskStore) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move {
            let status = self.resolve().await?;
            let outcome = classify_build(&status, &self.target, &self.change);
            debug!(job_id = %self.job_id, task = %self.task_id, ?outcome, "build status resolved");

            let committed = commit_with_retry(
                store,
                &self.job_id,
                &self.task_id,
                self.services.commit_attempts,
                |task| {
                    if task.status != TaskStatus::Ongoing {
                        return None;
                    }
                    let mut payload = task.payload.clone();
                    let build = payload.as_build_mut()?;
                    build.build_status = Some(status.clone());
                    let next = match &outcome {
                        BuildOutcome::InProgress => None,
                        BuildOutcome::Failed(error) => {
                            build.errors.push(error.clone());
                            Some(TaskStatus::Failed)
                        }
                        BuildOutcome::Cancelled(error) => {
                            build.errors.push(error.clone());
                            Some(TaskStatus::Cancelled)
                        }
                        BuildOutcome::Succeeded(isolate) => {
                            build.isolate_server = Some(isolate.server.clone());
                            build.isolate_hash = Some(isolate.hash.clone());
                            Some(TaskStatus::Completed)
                        }
                    };
                    Some((next, Some(payload)))
                },
            )
            .await?;

            if let CommitOutcome::Applied(task) = committed {
                if task.status.is_terminal() {
                    info!(
                        job_id = %self.job_id,
                        task = %self.task_id,
                        status = %task.status,
                        "build finished"
                    );
                }
                if let BuildOutcome::Succeeded(isolate) = outcome {
                    self.services.isolates.put(self.key.clone(), isolate);
                }
            }
            Ok(())
        })
    }
}

struct Initiate {
    job: Job,
    services: Services,
}

impl Evaluator for Initiate {
    fn evaluate(&self, task: &Task, _event: &Event, _accumulator: &mut Accumulator) -> Actions {
        let Some(build) = task.payload.as_build() else {
            return Vec::new();
        };

        let key = IsolateKey::new(&build.builder, &build.change, &build.target);
        if let Some(isolate) = self.services.isolates.get(&key) {
            return vec![Box::new(CompleteFromCache {
                job_id: self.job.id.clone(),
                task_id: task.id.clone(),
                isolate,
                commit_attempts: self.services.commit_attempts,
            })];
        }

        let callback = json!({
            "job_id": self.job.id,
            "task": {"type": FIND_ISOLATE, "id": task.id},
        });
        vec![Box::new(ScheduleBuild {
            job_id: self.job.id.clone(),
            task_id: task.id.clone(),
            seen_status: task.status,
            request: BuildRequest {
                builder: build.builder.clone(),
                bucket: build.bucket.clone(),
                change: build.change.clone(),
                tags: build_tags(&self.job),
                callback_user_data: Some(callback.to_string()),
            },
            services: self.services.clone(),
        })]
    }
}

struct Update {
    job: Job,
    services: Services,
}

impl Evaluator for Update {
    fn evaluate(&self, task: &Task, event: &Event, _accumulator: &mut Accumulator) -> Actions {
        let Some(build) = task.payload.as_build() else {
            return Vec::new();
        };

        let pushed = event
            .payload
            .get("build")
            .and_then(|value| serde_json::from_value::<BuildStatus>(value.clone()).ok())
            .filter(BuildStatus::is_final);

        if pushed.is_none() && build.build.is_none() {
            warn!(job_id = %self.job.id, task = %task.id, "no build details to update from");
            return vec![Box::new(MarkFailed {
                job_id: self.job.id.clone(),
                task_id: task.id.clone(),
                error: TaskError::new(
                    ErrorReason::MissingBuildDetails,
                    "No build details in attempt to update build status",
                ),
                commit_attempts: self.services.commit_attempts,
            })];
        }

        vec![Box::new(UpdateBuildStatus {
            job_id: self.job.id.clone(),
            task_id: task.id.clone(),
            handle: build.build.clone(),
            pushed,
            key: IsolateKey::new(&build.builder, &build.change, &build.target),
            target: build.target.clone(),
            change: build.change.clone(),
            services: self.services.clone(),
        })]
    }
}

/// Evaluator for `find_isolate` tasks.
///
/// Only targeted, non-terminal tasks react: `initiate` while not yet
/// ongoing, `update` while ongoing.
pub fn evaluator(job: &Job, services: &Services) -> Sequence {
    Sequence::new().then(PayloadLifting::new()).then(Filtering::new(
        all_of!(
            TaskTypeEq(FIND_ISOLATE),
            TaskIsEventTarget,
            not(TaskStatusIn::terminal())
        ),
        DispatchByEventType::new()
            .on(
                INITIATE,
                Filtering::new(
                    not(TaskStatusIn(vec![TaskStatus::Ongoing])),
                    Initiate {
                        job: job.clone(),
                        services: services.clone(),
                    },
                ),
            )
            .on(
                UPDATE,
                Filtering::new(
                    TaskStatusIn(vec![TaskStatus::Ongoing]),
                    Update {
                        job: job.clone(),
                        services: services.clone(),
                    },
                ),
            ),
    ))
}

/// Status report reducer for `find_isolate` tasks.
pub fn serialize(task: &Task, _event: &Event, accumulator: &mut Accumulator) -> Actions {
    let Some(build) = task.payload.as_build() else {
        return Vec::new();
    };

    let mut details = vec![Detail::new("builder", build.builder.clone(), None)];
    if let Some(handle) = &build.build {
        details.push(Detail::new("build", handle.id.clone(), handle.url.clone()));
    }
    if let Some((server, hash)) = build.isolate() {
        details.push(Detail::new(
            "isolate",
            hash,
            Some(format!("{server}/browse?digest={hash}")),
        ));
    }

    accumulator.entry(&task.id).report = Some(status_report(task, details));
    Vec::new()
}

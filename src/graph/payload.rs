// src/graph/payload.rs

//! Typed task payloads.
//!
//! Each task type owns one payload struct; [`TaskPayload`] is the tagged
//! union persisted with the task. Code that needs type-specific fields
//! matches on the variant (or uses the `as_*` accessors) instead of poking
//! at an untyped map.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::Change;
use crate::services::{BuildHandle, BuildStatus, Dimension, RunRequest, RunState};

pub const FIND_ISOLATE: &str = "find_isolate";
pub const RUN_TEST: &str = "run_test";

/// Classified reasons recorded on failed tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorReason {
    MissingBuildDetails,
    InvalidResponse,
    BuildFailed,
    BuildCancelled,
    BuildIsolateNotFound,
    SwarmingExpired,
    SwarmingTaskError,
    RunTestFailed,
    MissingRequirements,
    MissingDependencyInputs,
    DependencyError,
}

impl ErrorReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorReason::MissingBuildDetails => "MissingBuildDetails",
            ErrorReason::InvalidResponse => "InvalidResponse",
            ErrorReason::BuildFailed => "BuildFailed",
            ErrorReason::BuildCancelled => "BuildCancelled",
            ErrorReason::BuildIsolateNotFound => "BuildIsolateNotFound",
            ErrorReason::SwarmingExpired => "SwarmingExpired",
            ErrorReason::SwarmingTaskError => "SwarmingTaskError",
            ErrorReason::RunTestFailed => "RunTestFailed",
            ErrorReason::MissingRequirements => "MissingRequirements",
            ErrorReason::MissingDependencyInputs => "MissingDependencyInputs",
            ErrorReason::DependencyError => "DependencyError",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error attached to a task's payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub reason: String,
    pub message: String,
}

impl TaskError {
    pub fn new(reason: ErrorReason, message: impl Into<String>) -> Self {
        Self {
            reason: reason.as_str().to_string(),
            message: message.into(),
        }
    }

    /// Error with a free-form reason, e.g. a transport error kind.
    pub fn with_reason(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn is(&self, reason: ErrorReason) -> bool {
        self.reason == reason.as_str()
    }
}

/// Reference to a test output artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactRef {
    Isolate { server: String, hash: String },
    Cas {
        instance: String,
        hash: String,
        size_bytes: u64,
    },
}

impl ArtifactRef {
    /// Short value shown next to the artifact in status reports.
    pub fn value(&self) -> String {
        match self {
            ArtifactRef::Isolate { hash, .. } => hash.clone(),
            ArtifactRef::Cas {
                hash, size_bytes, ..
            } => format!("{hash}/{size_bytes}"),
        }
    }

    /// Browsable location of the artifact.
    pub fn url(&self) -> String {
        match self {
            ArtifactRef::Isolate { server, hash } => format!("{server}/browse?digest={hash}"),
            ArtifactRef::Cas {
                instance,
                hash,
                size_bytes,
            } => format!("https://cas-viewer.appspot.com/{instance}/blobs/{hash}/{size_bytes}/tree"),
        }
    }
}

/// Payload of a build-acquisition (`find_isolate`) task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildPayload {
    pub builder: String,
    pub target: String,
    pub bucket: String,
    pub change: Change,
    #[serde(default)]
    pub tries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_status: Option<BuildStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolate_server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolate_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<TaskError>,
}

impl BuildPayload {
    pub fn new(
        builder: impl Into<String>,
        target: impl Into<String>,
        bucket: impl Into<String>,
        change: Change,
    ) -> Self {
        Self {
            builder: builder.into(),
            target: target.into(),
            bucket: bucket.into(),
            change,
            tries: 0,
            build: None,
            build_status: None,
            isolate_server: None,
            isolate_hash: None,
            errors: Vec::new(),
        }
    }

    /// `(server, hash)` once the build output is known.
    pub fn isolate(&self) -> Option<(&str, &str)> {
        match (&self.isolate_server, &self.isolate_hash) {
            (Some(server), Some(hash)) => Some((server.as_str(), hash.as_str())),
            _ => None,
        }
    }
}

/// Subset of a run poll result kept in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    pub state: RunState,
    #[serde(default)]
    pub failure: bool,
}

/// Payload of a test-execution (`run_test`) task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPayload {
    pub swarming_server: String,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub extra_args: Vec<String>,
    pub change: Change,
    /// Attempt number within the change.
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub tries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RunRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swarming_task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RunSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<ArtifactRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<TaskError>,
}

impl TestPayload {
    pub fn new(swarming_server: impl Into<String>, change: Change, index: u32) -> Self {
        Self {
            swarming_server: swarming_server.into(),
            dimensions: Vec::new(),
            extra_args: Vec::new(),
            change,
            index,
            tries: 0,
            request: None,
            swarming_task_id: None,
            result: None,
            output: None,
            errors: Vec::new(),
        }
    }
}

/// Tagged union of every task type's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "snake_case")]
pub enum TaskPayload {
    FindIsolate(BuildPayload),
    RunTest(TestPayload),
}

impl TaskPayload {
    pub fn task_type(&self) -> &'static str {
        match self {
            TaskPayload::FindIsolate(_) => FIND_ISOLATE,
            TaskPayload::RunTest(_) => RUN_TEST,
        }
    }

    pub fn as_build(&self) -> Option<&BuildPayload> {
        match self {
            TaskPayload::FindIsolate(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_build_mut(&mut self) -> Option<&mut BuildPayload> {
        match self {
            TaskPayload::FindIsolate(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_test(&self) -> Option<&TestPayload> {
        match self {
            TaskPayload::RunTest(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_test_mut(&mut self) -> Option<&mut TestPayload> {
        match self {
            TaskPayload::RunTest(p) => Some(p),
            _ => None,
        }
    }

    pub fn errors(&self) -> &[TaskError] {
        match self {
            TaskPayload::FindIsolate(p) => &p.errors,
            TaskPayload::RunTest(p) => &p.errors,
        }
    }

    pub fn push_error(&mut self, error: TaskError) {
        match self {
            TaskPayload::FindIsolate(p) => p.errors.push(error),
            TaskPayload::RunTest(p) => p.errors.push(error),
        }
    }

    pub fn change(&self) -> &Change {
        match self {
            TaskPayload::FindIsolate(p) => &p.change,
            TaskPayload::RunTest(p) => &p.change,
        }
    }
}

// src/services/swarming.rs

//! Boundary of the distributed test-execution service.

use serde::{Deserialize, Serialize};

use crate::services::ServiceError;
use crate::types::BoxFuture;

/// A bot dimension used to pick where a test runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub key: String,
    pub value: String,
}

impl Dimension {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Legacy isolate reference as the service spells it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolateRef {
    pub isolatedserver: String,
    pub isolated: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasDigest {
    pub hash: String,
    pub size_bytes: u64,
}

/// Content-addressable-storage root reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasReference {
    pub cas_instance: String,
    pub digest: CasDigest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunProperties {
    pub input_ref: IsolateRef,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    pub execution_timeout_secs: String,
    pub io_timeout_secs: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSlice {
    pub properties: RunProperties,
    pub expiration_secs: String,
}

/// Request body for [`TestService::schedule_run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub name: String,
    pub user: String,
    pub priority: String,
    pub task_slices: Vec<TaskSlice>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubsub_topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubsub_userdata: Option<String>,
}

/// Handle of a scheduled run: which server and which task id to poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub server: String,
    pub task_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Expired,
    TimedOut,
    BotDied,
    Canceled,
    Killed,
    NoResource,
    #[serde(other)]
    Unknown,
}

impl RunState {
    /// Queued or running; poll again later.
    pub fn is_active(self) -> bool {
        matches!(self, RunState::Pending | RunState::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Pending => "PENDING",
            RunState::Running => "RUNNING",
            RunState::Completed => "COMPLETED",
            RunState::Expired => "EXPIRED",
            RunState::TimedOut => "TIMED_OUT",
            RunState::BotDied => "BOT_DIED",
            RunState::Canceled => "CANCELED",
            RunState::Killed => "KILLED",
            RunState::NoResource => "NO_RESOURCE",
            RunState::Unknown => "UNKNOWN",
        }
    }
}

/// Poll result for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub state: RunState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    /// Set by the service when the test process exited unsuccessfully.
    #[serde(default)]
    pub failure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs_ref: Option<IsolateRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cas_output_root: Option<CasReference>,
}

/// The test-execution service.
pub trait TestService: Send + Sync {
    fn schedule_run<'a>(
        &'a self,
        server: &'a str,
        request: &'a RunRequest,
    ) -> BoxFuture<'a, Result<RunHandle, ServiceError>>;

    fn poll_run<'a>(&'a self, handle: &'a RunHandle) -> BoxFuture<'a, Result<RunResult, ServiceError>>;
}

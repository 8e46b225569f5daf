use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical task identifier, unique within a job's graph.
pub type TaskId = String;

/// Canonical job identifier.
pub type JobId = String;

/// Boxed, sendable future used at the async trait seams (stores, services,
/// actions).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persisted status of a task.
///
/// - `Pending`: created, nothing scheduled yet (or reset for a retry).
/// - `Ongoing`: work was handed to an external service and we are waiting
///   for updates.
/// - `Completed`, `Failed`, `Cancelled`: terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Ongoing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub const TERMINAL: [TaskStatus; 3] = [
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }

    /// Whether the store accepts a transition from `self` to `next`.
    ///
    /// `ongoing -> ongoing` is allowed so progress can be recorded together
    /// with a status; terminal tasks may only be reset to `pending`.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match self {
            Pending => matches!(next, Ongoing | Completed | Failed | Cancelled),
            Ongoing => matches!(next, Ongoing | Completed | Failed | Cancelled),
            Completed | Failed | Cancelled => next == Pending,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Ongoing => "ongoing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "ongoing" => Ok(TaskStatus::Ongoing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" | "canceled" => Ok(TaskStatus::Cancelled),
            other => Err(format!(
                "invalid task status: {other} (expected pending, ongoing, completed, failed or cancelled)"
            )),
        }
    }
}

// src/engine/event.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::TaskId;

/// First scheduling of a task.
pub const INITIATE: &str = "initiate";
/// Asynchronous status callback or poll trigger.
pub const UPDATE: &str = "update";
/// Read-only pass used for reporting.
pub const SELECT: &str = "select";

/// External trigger driving one evaluation.
///
/// An event without a target is a broadcast: it targets every task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_task: Option<TaskId>,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl Event {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            target_task: None,
            payload: Map::new(),
        }
    }

    pub fn initiate() -> Self {
        Self::new(INITIATE)
    }

    pub fn update() -> Self {
        Self::new(UPDATE)
    }

    pub fn select() -> Self {
        Self::new(SELECT)
    }

    pub fn with_target(mut self, task_id: impl Into<TaskId>) -> Self {
        self.target_task = Some(task_id.into());
        self
    }

    pub fn with_payload(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Whether this event is aimed at `task_id`.
    pub fn targets(&self, task_id: &str) -> bool {
        self.target_task.as_deref().is_none_or(|target| target == task_id)
    }
}

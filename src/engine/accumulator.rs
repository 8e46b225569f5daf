// src/engine/accumulator.rs

//! Per-evaluation results keyed by task id.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::graph::{TaskError, TaskPayload};
use crate::types::{TaskId, TaskStatus};

/// One `{key, value, url}` line of a status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detail {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Detail {
    pub fn new(key: impl Into<String>, value: impl Into<String>, url: Option<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            url,
        }
    }
}

/// Status projection written by the serializer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub completed: bool,
    /// Comma-joined error reasons, if any.
    pub exception: Option<String>,
    pub details: Vec<Detail>,
}

/// What an evaluation pass knows about one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskResult {
    pub status: Option<TaskStatus>,
    /// Typed copy of the persisted payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<TaskPayload>,
    /// Lifted payload fields.
    pub fields: Map<String, Value>,
    /// Findings recorded during the pass (validators).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<TaskError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<StatusReport>,
}

/// Mapping from task id to [`TaskResult`], iterated in insertion order
/// (the traversal order of the pass that built it).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accumulator {
    entries: HashMap<TaskId, TaskResult>,
    order: Vec<TaskId>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, task_id: &str) -> Option<&TaskResult> {
        self.entries.get(task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.entries.contains_key(task_id)
    }

    /// Entry for `task_id`, created empty on first use.
    pub fn entry(&mut self, task_id: &str) -> &mut TaskResult {
        if !self.entries.contains_key(task_id) {
            self.order.push(task_id.to_string());
        }
        self.entries.entry(task_id.to_string()).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskResult)> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|r| (id.as_str(), r)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn status_of(&self, task_id: &str) -> Option<TaskStatus> {
        self.get(task_id).and_then(|r| r.status)
    }
}

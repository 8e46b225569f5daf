// src/engine/updates.rs

//! Decoding of push notifications into update events.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::engine::Event;
use crate::errors::{Result, TrygraphError};
use crate::types::{JobId, TaskId};

#[derive(Debug, Deserialize)]
struct TaskRef {
    #[serde(rename = "type")]
    task_type: String,
    id: TaskId,
}

#[derive(Debug, Deserialize)]
struct TaskUpdateMessage {
    job_id: JobId,
    task: TaskRef,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

/// Turn a notification like
/// `{"job_id": "j", "task": {"type": "run_test", "id": "t"}, "task_id": "..."}`
/// into the job id and an `update` event targeting that task.
///
/// Every field other than `job_id` and `task` ends up in the event payload,
/// along with `task_type`.
pub fn event_from_task_update(json: &str) -> Result<(JobId, Event)> {
    let message: TaskUpdateMessage = serde_json::from_str(json)?;
    if message.job_id.is_empty() || message.task.id.is_empty() {
        return Err(TrygraphError::InvalidEvent(
            "task update is missing job_id or task id".to_string(),
        ));
    }

    let mut event = Event::update().with_target(message.task.id);
    event.payload = message.rest;
    event
        .payload
        .insert("task_type".to_string(), Value::String(message.task.task_type));
    Ok((message.job_id, event))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_targeted_update() {
        let (job_id, event) = event_from_task_update(
            r#"{"job_id": "job-1", "task": {"type": "run_test", "id": "run_test_x_0"}, "task_id": "swarm-1"}"#,
        )
        .unwrap();

        assert_eq!(job_id, "job-1");
        assert_eq!(event.event_type, "update");
        assert_eq!(event.target_task.as_deref(), Some("run_test_x_0"));
        assert_eq!(event.payload["task_id"], "swarm-1");
        assert_eq!(event.payload["task_type"], "run_test");
    }

    #[test]
    fn rejects_messages_without_task() {
        assert!(event_from_task_update(r#"{"job_id": "job-1"}"#).is_err());
        assert!(
            event_from_task_update(r#"{"job_id": "", "task": {"type": "run_test", "id": "t"}}"#)
                .is_err()
        );
    }
}

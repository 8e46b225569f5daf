// src/services/build.rs

//! Boundary of the build-request service.
//!
//! The engine only reads the fields below; the full wire schema is owned by
//! the service client implementing [`BuildService`].

use serde::{Deserialize, Serialize};

use crate::graph::Change;
use crate::services::ServiceError;
use crate::types::BoxFuture;

/// Everything needed to ask the build-request service for a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub builder: String,
    pub bucket: String,
    pub change: Change,
    /// `key:value` tags, in the order the service should record them.
    pub tags: Vec<String>,
    /// Opaque data the service hands back in push notifications so updates
    /// can be routed to the right task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_user_data: Option<String>,
}

/// Opaque scheduling result returned by [`BuildService::schedule_build`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildHandle {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildState {
    Scheduled,
    Started,
    Completed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildResult {
    Success,
    Failure,
    #[serde(alias = "CANCELLED")]
    Canceled,
    #[serde(other)]
    Unknown,
}

/// Build status as reported by a poll or a push notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: BuildState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BuildResult>,
    /// JSON document carrying the build's output properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_details_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl BuildStatus {
    /// A status that needs no further polling to decide the task's outcome.
    pub fn is_final(&self) -> bool {
        self.status == BuildState::Completed && self.result.is_some()
    }
}

/// The build-request service.
pub trait BuildService: Send + Sync {
    fn schedule_build<'a>(
        &'a self,
        request: &'a BuildRequest,
    ) -> BoxFuture<'a, Result<BuildHandle, ServiceError>>;

    fn poll_build<'a>(
        &'a self,
        handle: &'a BuildHandle,
    ) -> BoxFuture<'a, Result<BuildStatus, ServiceError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wire_status_with_unknown_values() {
        let status: BuildStatus = serde_json::from_str(
            r#"{"status": "INFRA_PENDING", "result": "CANCELLED"}"#,
        )
        .unwrap();
        assert_eq!(status.status, BuildState::Unknown);
        assert_eq!(status.result, Some(BuildResult::Canceled));
        assert!(!status.is_final());
    }

    #[test]
    fn completed_with_result_is_final() {
        let status: BuildStatus =
            serde_json::from_str(r#"{"status": "COMPLETED", "result": "SUCCESS"}"#).unwrap();
        assert!(status.is_final());
    }
}

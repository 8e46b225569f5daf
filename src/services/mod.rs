// src/services/mod.rs

//! External collaborators the task types talk to.
//!
//! - [`build`] is the build-request service boundary.
//! - [`swarming`] is the test-execution service boundary.
//! - [`isolate`] is the artifact cache consulted before requesting builds.
//!
//! Only the traits and the fields the engine reads live here; concrete
//! network clients are supplied by the embedding application (tests use the
//! fakes from `trygraph-test-utils`).

pub mod build;
pub mod isolate;
pub mod swarming;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub use build::{BuildHandle, BuildRequest, BuildResult, BuildService, BuildState, BuildStatus};
pub use isolate::{InMemoryIsolateCache, Isolate, IsolateCache, IsolateKey};
pub use swarming::{
    CasDigest, CasReference, Dimension, IsolateRef, RunHandle, RunProperties, RunRequest,
    RunResult, RunState, TaskSlice, TestService,
};

/// Transport-level failure talking to an external service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("{service} call timed out after {timeout:?}")]
    Timeout {
        service: &'static str,
        timeout: Duration,
    },

    #[error("{service} request failed: {message}")]
    Request {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned HTTP {status}: {message}")]
    Http {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("invalid response from {service}: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },
}

impl ServiceError {
    /// Short error kind recorded as the task error reason.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Timeout { .. } => "Timeout",
            ServiceError::Request { .. } => "RequestError",
            ServiceError::Http { .. } => "HttpError",
            ServiceError::InvalidResponse { .. } => "InvalidResponse",
        }
    }
}

/// Service handles and call limits shared by every action of a job.
#[derive(Clone)]
pub struct Services {
    pub builds: Arc<dyn BuildService>,
    pub tests: Arc<dyn TestService>,
    pub isolates: Arc<dyn IsolateCache>,
    /// Upper bound on a single external call.
    pub call_timeout: Duration,
    /// Compare-and-set attempts per task update.
    pub commit_attempts: u32,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("isolates", &self.isolates)
            .field("call_timeout", &self.call_timeout)
            .field("commit_attempts", &self.commit_attempts)
            .finish_non_exhaustive()
    }
}

impl Services {
    pub fn new(
        builds: Arc<dyn BuildService>,
        tests: Arc<dyn TestService>,
        isolates: Arc<dyn IsolateCache>,
    ) -> Self {
        Self {
            builds,
            tests,
            isolates,
            call_timeout: Duration::from_secs(crate::config::DEFAULT_CALL_TIMEOUT_SECS),
            commit_attempts: crate::config::DEFAULT_COMMIT_ATTEMPTS,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_commit_attempts(mut self, attempts: u32) -> Self {
        self.commit_attempts = attempts;
        self
    }

    /// Run an external call under [`Services::call_timeout`].
    pub async fn bounded<T, F>(&self, service: &'static str, call: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout {
                service,
                timeout: self.call_timeout,
            }),
        }
    }
}

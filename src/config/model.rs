// src/config/model.rs

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::config::{DEFAULT_CALL_TIMEOUT_SECS, DEFAULT_COMMIT_ATTEMPTS, DEFAULT_MAX_PASSES};
use crate::engine::{Engine, EngineSettings, Job};
use crate::graph::Change;
use crate::services::{Dimension, Services};
use crate::store::TaskStore;
use crate::tasks::{find_isolate, run_test};

/// Job file as read from TOML, before validation.
///
/// ```toml
/// [job]
/// id = "job-1"
/// user = "someone@example.com"
///
/// [engine]
/// max_passes = 8
///
/// [build]
/// builder = "Mac Builder"
/// target = "telemetry_perf_tests"
/// bucket = "luci.bucket"
/// [[build.change.commits]]
/// repository = "chromium"
/// git_hash = "7c7e90be"
///
/// [test]
/// swarming_server = "https://swarming.example"
/// attempts = 10
/// ```
///
/// `[engine]` and `[test]` are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawJobFile {
    pub job: JobSection,
    #[serde(default)]
    pub engine: EngineSection,
    pub build: BuildSection,
    #[serde(default)]
    pub test: Option<TestSection>,
}

/// `[job]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSection {
    pub id: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub comparison_mode: Option<String>,
}

/// `[engine]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_commit_attempts")]
    pub commit_attempts: u32,
    #[serde(default = "default_max_passes")]
    pub max_passes: u32,
}

fn default_call_timeout_secs() -> u64 {
    DEFAULT_CALL_TIMEOUT_SECS
}

fn default_commit_attempts() -> u32 {
    DEFAULT_COMMIT_ATTEMPTS
}

fn default_max_passes() -> u32 {
    DEFAULT_MAX_PASSES
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout_secs(),
            commit_attempts: default_commit_attempts(),
            max_passes: default_max_passes(),
        }
    }
}

impl EngineSection {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            max_passes: self.max_passes,
            commit_attempts: self.commit_attempts,
        }
    }

    /// Engine over `store` with these pass and commit limits.
    pub fn engine(&self, store: Arc<dyn TaskStore>) -> Engine {
        Engine::new(store).with_settings(self.settings())
    }

    /// `services` with this call timeout and commit attempts.
    pub fn apply(&self, services: Services) -> Services {
        services
            .with_call_timeout(self.call_timeout())
            .with_commit_attempts(self.commit_attempts)
    }
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
    pub builder: String,
    pub target: String,
    pub bucket: String,
    #[serde(default)]
    pub change: Change,
}

/// `[test]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TestSection {
    pub swarming_server: String,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

fn default_attempts() -> u32 {
    1
}

/// Validated job file; build with `JobFile::try_from(raw)`.
#[derive(Debug, Clone, PartialEq)]
pub struct JobFile {
    pub job: Job,
    pub engine: EngineSection,
    pub build: find_isolate::TaskOptions,
    pub test: Option<run_test::TaskOptions>,
}

#![allow(dead_code)]

use serde_json::json;

use trygraph::engine::Job;
use trygraph::graph::{Change, Commit};
use trygraph::services::{
    BuildResult, BuildState, BuildStatus, Dimension, IsolateRef, RunResult, RunState,
};
use trygraph::tasks::{find_isolate, run_test};

pub const JOB_ID: &str = "job-1";
pub const TARGET: &str = "telemetry_perf_tests";
pub const ISOLATE_SERVER: &str = "https://isolate.server";
pub const SWARMING_SERVER: &str = "https://swarming.server";

pub fn change() -> Change {
    Change::from_commits([Commit::new("chromium", "7c7e90be")])
}

pub fn job() -> Job {
    Job {
        id: JOB_ID.to_string(),
        user: "someone@example.com".to_string(),
        url: format!("https://pinpoint.example/job/{JOB_ID}"),
        comparison_mode: Some("performance".to_string()),
    }
}

pub fn build_options() -> find_isolate::TaskOptions {
    find_isolate::TaskOptions {
        builder: "Mac Builder".to_string(),
        target: TARGET.to_string(),
        bucket: "luci.bucket".to_string(),
        change: change(),
    }
}

pub fn test_options(attempts: u32) -> run_test::TaskOptions {
    run_test::TaskOptions {
        build_options: build_options(),
        swarming_server: SWARMING_SERVER.to_string(),
        dimensions: vec![Dimension::new("pool", "Chrome-perf-pinpoint")],
        extra_args: vec!["--pageset-repeat=1".to_string()],
        attempts,
    }
}

/// Finished, successful build whose result details carry `hash` for
/// [`TARGET`].
pub fn build_succeeded(hash: &str) -> BuildStatus {
    let mut hashes = serde_json::Map::new();
    hashes.insert(TARGET.to_string(), json!(hash));
    let details = json!({
        "properties": {
            "got_revision_cp": "refs/heads/master@7c7e90be",
            "isolate_server": ISOLATE_SERVER,
            "swarm_hashes_refs/heads/master(at)7c7e90be_without_patch": hashes,
        }
    });
    BuildStatus {
        id: Some("build-1".to_string()),
        status: BuildState::Completed,
        result: Some(BuildResult::Success),
        result_details_json: Some(details.to_string()),
        url: None,
    }
}

pub fn build_finished(result: BuildResult) -> BuildStatus {
    BuildStatus {
        id: Some("build-1".to_string()),
        status: BuildState::Completed,
        result: Some(result),
        result_details_json: None,
        url: None,
    }
}

pub fn run_finished(hash: &str, failure: bool) -> RunResult {
    RunResult {
        state: RunState::Completed,
        bot_id: Some("bot-1".to_string()),
        failure,
        outputs_ref: Some(IsolateRef {
            isolatedserver: ISOLATE_SERVER.to_string(),
            isolated: hash.to_string(),
        }),
        cas_output_root: None,
    }
}

pub fn run_in_state(state: RunState) -> RunResult {
    RunResult {
        state,
        bot_id: None,
        failure: false,
        outputs_ref: None,
        cas_output_root: None,
    }
}

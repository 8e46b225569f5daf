mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    Harness, assert_status, build_task_id, builders, error_reasons, init_tracing, with_timeout,
};
use serde_json::json;
use trygraph::engine::Event;
use trygraph::services::{BuildResult, Isolate, IsolateCache, IsolateKey};
use trygraph::store::{TaskStore, TaskUpdate};
use trygraph::tasks::find_isolate;
use trygraph::types::TaskStatus;
use trygraph_test_utils::fakes::{FakeBuildService, SlowBuildService};

async fn build_harness() -> Harness {
    let h = Harness::new();
    h.populate(find_isolate::create_graph(&builders::build_options()))
        .await
        .unwrap();
    h
}

#[tokio::test]
async fn cache_hit_completes_without_requesting_a_build() {
    init_tracing();
    let h = build_harness().await;
    h.isolates.put(
        IsolateKey::new("Mac Builder", &builders::change(), builders::TARGET),
        Isolate {
            server: "https://isolate.server".to_string(),
            hash: "cached-hash".to_string(),
        },
    );

    h.evaluate(Event::initiate()).await.unwrap();

    let task = h.task(&build_task_id()).await;
    assert_status(&task, TaskStatus::Completed);
    let build = task.payload.as_build().unwrap();
    assert_eq!(build.isolate(), Some(("https://isolate.server", "cached-hash")));
    assert!(h.builds.scheduled().is_empty());
}

#[tokio::test]
async fn cache_miss_schedules_a_tagged_build() {
    init_tracing();
    let h = build_harness().await;

    h.evaluate(Event::initiate()).await.unwrap();

    let task = h.task(&build_task_id()).await;
    assert_status(&task, TaskStatus::Ongoing);
    let build = task.payload.as_build().unwrap();
    assert_eq!(build.tries, 1);
    assert_eq!(build.build.as_ref().map(|b| b.id.as_str()), Some("build-1"));

    let scheduled = h.builds.scheduled();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].builder, "Mac Builder");
    assert!(scheduled[0].tags.contains(&"pinpoint_job_id:job-1".to_string()));
    let callback: serde_json::Value =
        serde_json::from_str(scheduled[0].callback_user_data.as_deref().unwrap()).unwrap();
    assert_eq!(callback["task"]["id"], build_task_id());
}

#[tokio::test]
async fn repeated_initiate_does_not_schedule_twice() {
    init_tracing();
    let h = build_harness().await;

    h.evaluate(Event::initiate()).await.unwrap();
    h.evaluate(Event::initiate()).await.unwrap();

    assert_eq!(h.builds.scheduled().len(), 1);
    assert_eq!(h.task(&build_task_id()).await.payload.as_build().unwrap().tries, 1);
}

#[tokio::test]
async fn successful_build_yields_isolate_and_fills_cache() {
    init_tracing();
    let h = build_harness().await;
    h.evaluate(Event::initiate()).await.unwrap();

    h.builds.push_poll(Ok(builders::build_succeeded("abc123")));
    h.evaluate(Event::update()).await.unwrap();

    let task = h.task(&build_task_id()).await;
    assert_status(&task, TaskStatus::Completed);
    assert_eq!(
        task.payload.as_build().unwrap().isolate(),
        Some(("https://isolate.server", "abc123"))
    );
    assert_eq!(h.builds.polled().len(), 1);

    let cached = h
        .isolates
        .get(&IsolateKey::new("Mac Builder", &builders::change(), builders::TARGET));
    assert_eq!(cached.map(|i| i.hash), Some("abc123".to_string()));
}

#[tokio::test]
async fn running_build_stays_ongoing() {
    init_tracing();
    let h = build_harness().await;
    h.evaluate(Event::initiate()).await.unwrap();

    h.evaluate(Event::update()).await.unwrap();

    let task = h.task(&build_task_id()).await;
    assert_status(&task, TaskStatus::Ongoing);
    assert!(task.payload.as_build().unwrap().build_status.is_some());
}

#[tokio::test]
async fn pushed_build_status_skips_polling() {
    init_tracing();
    let h = build_harness().await;
    h.evaluate(Event::initiate()).await.unwrap();

    let pushed = serde_json::to_value(builders::build_succeeded("pushed-hash")).unwrap();
    let event = Event::update()
        .with_target(build_task_id())
        .with_payload("build", pushed);
    h.evaluate(event).await.unwrap();

    let task = h.task(&build_task_id()).await;
    assert_status(&task, TaskStatus::Completed);
    assert_eq!(
        task.payload.as_build().unwrap().isolate_hash.as_deref(),
        Some("pushed-hash")
    );
    assert!(h.builds.polled().is_empty());
}

#[tokio::test]
async fn failed_and_cancelled_builds_are_terminal() {
    init_tracing();
    for (result, status, reason) in [
        (BuildResult::Failure, TaskStatus::Failed, "BuildFailed"),
        (BuildResult::Canceled, TaskStatus::Cancelled, "BuildCancelled"),
    ] {
        let h = build_harness().await;
        h.evaluate(Event::initiate()).await.unwrap();
        h.builds.push_poll(Ok(builders::build_finished(result)));

        h.evaluate(Event::update()).await.unwrap();

        let task = h.task(&build_task_id()).await;
        assert_status(&task, status);
        assert_eq!(error_reasons(&task), vec![reason]);
    }
}

#[tokio::test]
async fn build_without_result_details_is_not_found() {
    init_tracing();
    let h = build_harness().await;
    h.evaluate(Event::initiate()).await.unwrap();
    h.builds
        .push_poll(Ok(builders::build_finished(BuildResult::Success)));

    h.evaluate(Event::update()).await.unwrap();

    let task = h.task(&build_task_id()).await;
    assert_status(&task, TaskStatus::Failed);
    assert_eq!(error_reasons(&task), vec!["BuildIsolateNotFound"]);
}

#[tokio::test]
async fn ongoing_task_without_build_details_fails() {
    init_tracing();
    let h = build_harness().await;
    let task = h.task(&build_task_id()).await;
    h.store
        .update_task(&h.job.id, TaskUpdate::new(&task).status(TaskStatus::Ongoing))
        .await
        .unwrap();

    let event = Event::update().with_payload("note", json!("no build here"));
    h.evaluate(event).await.unwrap();

    let task = h.task(&build_task_id()).await;
    assert_status(&task, TaskStatus::Failed);
    assert_eq!(error_reasons(&task), vec!["MissingBuildDetails"]);
    assert!(h.builds.polled().is_empty());
}

#[tokio::test]
async fn update_during_a_slow_schedule_keeps_the_build() {
    init_tracing();
    let builds = Arc::new(FakeBuildService::new());
    let h = Harness::with_build_service(Arc::new(SlowBuildService::new(
        builds.clone(),
        Duration::from_millis(200),
    )));
    h.populate(find_isolate::create_graph(&builders::build_options()))
        .await
        .unwrap();

    let (initiated, updated) = with_timeout(async {
        tokio::join!(h.evaluate(Event::initiate()), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            h.evaluate(Event::update()).await
        })
    })
    .await;
    initiated.unwrap();
    updated.unwrap();

    let task = h.task(&build_task_id()).await;
    assert_status(&task, TaskStatus::Ongoing);
    assert!(error_reasons(&task).is_empty());
    let build = task.payload.as_build().unwrap();
    assert_eq!(build.tries, 1);
    assert_eq!(build.build.as_ref().map(|b| b.id.as_str()), Some("build-1"));
    assert_eq!(builds.scheduled().len(), 1);
    assert!(builds.polled().is_empty());
}

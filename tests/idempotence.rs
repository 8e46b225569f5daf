mod common;

use common::{Harness, assert_status, build_task_id, builders, init_tracing, test_task_id};
use trygraph::engine::{Event, traverse};
use trygraph::store::TaskStore;
use trygraph::tasks::{self, run_test};
use trygraph::types::TaskStatus;

async fn finished_job() -> Harness {
    let h = Harness::new();
    h.populate(run_test::create_graph(&builders::test_options(1)))
        .await
        .unwrap();
    h.evaluate(Event::initiate()).await.unwrap();
    h.builds.push_poll(Ok(builders::build_succeeded("abc123")));
    h.evaluate(Event::update()).await.unwrap();
    h.tests.push_poll(Ok(builders::run_finished("out-hash", false)));
    h.evaluate(Event::update().with_target(test_task_id(0)))
        .await
        .unwrap();
    h
}

#[tokio::test]
async fn updates_against_terminal_tasks_are_no_ops() {
    init_tracing();
    let h = finished_job().await;
    let before = h.store.load_graph(&h.job.id).await.unwrap();
    for task in &before {
        assert_status(task, TaskStatus::Completed);
    }
    let polls = (h.builds.polled().len(), h.tests.polled().len());

    h.evaluate(Event::update()).await.unwrap();
    h.evaluate(Event::update().with_target(build_task_id()))
        .await
        .unwrap();
    h.evaluate(Event::update().with_target(test_task_id(0)))
        .await
        .unwrap();

    let after = h.store.load_graph(&h.job.id).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(polls, (h.builds.polled().len(), h.tests.polled().len()));
    assert_eq!(h.builds.scheduled().len(), 1);
    assert_eq!(h.tests.scheduled().len(), 1);
}

#[tokio::test]
async fn terminal_graph_yields_no_actions() {
    init_tracing();
    let h = finished_job().await;
    let tasks_now = h.store.load_graph(&h.job.id).await.unwrap();
    let evaluator = tasks::job_evaluator(&h.job, &h.services);

    for event in [Event::initiate(), Event::update()] {
        let (accumulator, actions) = traverse(&tasks_now, &event, &evaluator).unwrap();
        assert!(actions.is_empty());
        assert_eq!(accumulator.len(), tasks_now.len());
    }
}

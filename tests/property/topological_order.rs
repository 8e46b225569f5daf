use std::collections::HashMap;

use proptest::prelude::*;
use trygraph::engine::{Accumulator, Actions, Event, Noop, traverse};
use trygraph::graph::{
    Change, Commit, DagGraph, Dependency, Task, TaskGraph, TaskPayload, TaskVertex, TestPayload,
};

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn graph_strategy(max_tasks: usize) -> impl Strategy<Value = TaskGraph> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(move |raw_deps| {
            let change = Change::from_commits([Commit::new("chromium", "aaaaaaa")]);
            let mut vertices = Vec::new();
            let mut edges = Vec::new();
            for (i, potential) in raw_deps.into_iter().enumerate() {
                let id = format!("task_{i}");
                vertices.push(TaskVertex::new(
                    id.clone(),
                    TaskPayload::RunTest(TestPayload::new("s", change.clone(), i as u32)),
                ));
                if i > 0 {
                    for dep in potential {
                        edges.push(Dependency::new(id.clone(), format!("task_{}", dep % i)));
                    }
                }
            }
            TaskGraph::new(vertices, edges)
        })
    })
}

fn record_visit(task: &Task, _event: &Event, acc: &mut Accumulator) -> Actions {
    let position = acc.len();
    acc.entry(&task.id).fields.insert(
        "position".to_string(),
        serde_json::Value::from(position as u64),
    );
    Vec::new()
}

proptest! {
    #[test]
    fn dependencies_are_visited_first(graph in graph_strategy(12)) {
        prop_assert!(graph.validate().is_ok());
        let tasks = graph.into_tasks();

        let (accumulator, actions) = traverse(&tasks, &Event::update(), &record_visit).unwrap();
        prop_assert!(actions.is_empty());
        prop_assert_eq!(accumulator.len(), tasks.len());

        let position: HashMap<&str, usize> = accumulator
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (id, i))
            .collect();
        for task in &tasks {
            for dep in &task.dependencies {
                prop_assert!(position[dep.as_str()] < position[task.id.as_str()]);
            }
        }
    }

    #[test]
    fn evaluation_order_is_deterministic(graph in graph_strategy(10)) {
        let tasks = graph.into_tasks();
        let first = DagGraph::from_tasks(&tasks).evaluation_order().unwrap();
        let second = DagGraph::from_tasks(&tasks).evaluation_order().unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.len(), tasks.len());

        let (accumulator, _) = traverse(&tasks, &Event::select(), &Noop).unwrap();
        prop_assert!(accumulator.is_empty());
    }
}

// src/engine/predicates.rs

//! Pure boolean checks over `(task, event, accumulator)`.

use crate::engine::{Accumulator, Event};
use crate::graph::Task;
use crate::types::TaskStatus;

pub trait Predicate: Send + Sync {
    fn test(&self, task: &Task, event: &Event, accumulator: &Accumulator) -> bool;
}

impl<F> Predicate for F
where
    F: Fn(&Task, &Event, &Accumulator) -> bool + Send + Sync,
{
    fn test(&self, task: &Task, event: &Event, accumulator: &Accumulator) -> bool {
        self(task, event, accumulator)
    }
}

#[derive(Debug, Clone)]
pub struct TaskTypeEq(pub &'static str);

impl Predicate for TaskTypeEq {
    fn test(&self, task: &Task, _event: &Event, _accumulator: &Accumulator) -> bool {
        task.task_type() == self.0
    }
}

#[derive(Debug, Clone)]
pub struct TaskStatusIn(pub Vec<TaskStatus>);

impl TaskStatusIn {
    pub fn terminal() -> Self {
        Self(TaskStatus::TERMINAL.to_vec())
    }
}

impl Predicate for TaskStatusIn {
    fn test(&self, task: &Task, _event: &Event, _accumulator: &Accumulator) -> bool {
        self.0.contains(&task.status)
    }
}

/// True when the event targets this task (or targets nothing in particular).
#[derive(Debug, Clone, Copy)]
pub struct TaskIsEventTarget;

impl Predicate for TaskIsEventTarget {
    fn test(&self, task: &Task, event: &Event, _accumulator: &Accumulator) -> bool {
        event.targets(&task.id)
    }
}

pub struct Not(pub Box<dyn Predicate>);

impl Predicate for Not {
    fn test(&self, task: &Task, event: &Event, accumulator: &Accumulator) -> bool {
        !self.0.test(task, event, accumulator)
    }
}

/// Conjunction; stops at the first false.
pub struct All(pub Vec<Box<dyn Predicate>>);

impl Predicate for All {
    fn test(&self, task: &Task, event: &Event, accumulator: &Accumulator) -> bool {
        self.0.iter().all(|p| p.test(task, event, accumulator))
    }
}

pub fn not(predicate: impl Predicate + 'static) -> Not {
    Not(Box::new(predicate))
}

#[macro_export]
macro_rules! all_of {
    ($($p:expr),+ $(,)?) => {
        $crate::engine::predicates::All(vec![$(Box::new($p) as Box<dyn $crate::engine::predicates::Predicate>),+])
    };
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::graph::{BuildPayload, Change, Commit, TaskPayload};

    fn task(id: &str, status: TaskStatus) -> Task {
        Task {
            id: id.to_string(),
            status,
            payload: TaskPayload::FindIsolate(BuildPayload::new(
                "builder",
                "target",
                "bucket",
                Change::from_commits([Commit::new("chromium", "abc")]),
            )),
            dependencies: vec![],
            revision: 0,
        }
    }

    #[test]
    fn primitives() {
        let acc = Accumulator::new();
        let t = task("a", TaskStatus::Ongoing);
        let event = Event::update().with_target("a");

        assert!(TaskTypeEq("find_isolate").test(&t, &event, &acc));
        assert!(!TaskTypeEq("run_test").test(&t, &event, &acc));
        assert!(TaskStatusIn(vec![TaskStatus::Ongoing]).test(&t, &event, &acc));
        assert!(!TaskStatusIn::terminal().test(&t, &event, &acc));
        assert!(TaskIsEventTarget.test(&t, &event, &acc));
        assert!(!TaskIsEventTarget.test(&t, &Event::update().with_target("b"), &acc));
        assert!(not(TaskStatusIn::terminal()).test(&t, &event, &acc));
    }

    #[test]
    fn all_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let counting = move |_: &Task, _: &Event, _: &Accumulator| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        };

        let acc = Accumulator::new();
        let t = task("a", TaskStatus::Pending);
        let predicate = all_of!(TaskStatusIn(vec![TaskStatus::Completed]), counting);

        assert!(!predicate.test(&t, &Event::initiate(), &acc));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

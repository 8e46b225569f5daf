// src/engine/evaluators.rs

//! Evaluator trait and the combinators task types are composed from.
//!
//! An evaluator looks at one task, the current event and the accumulator
//! built so far, may write into the accumulator, and returns the actions it
//! wants executed. Evaluators never perform I/O themselves.

use std::collections::HashMap;

use serde_json::Value;
use tracing::trace;

use crate::engine::action::Action;
use crate::engine::predicates::Predicate;
use crate::engine::{Accumulator, Event};
use crate::graph::Task;

pub type Actions = Vec<Box<dyn Action>>;

pub trait Evaluator: Send + Sync {
    fn evaluate(&self, task: &Task, event: &Event, accumulator: &mut Accumulator) -> Actions;
}

impl<F> Evaluator for F
where
    F: Fn(&Task, &Event, &mut Accumulator) -> Actions + Send + Sync,
{
    fn evaluate(&self, task: &Task, event: &Event, accumulator: &mut Accumulator) -> Actions {
        self(task, event, accumulator)
    }
}

/// Evaluator that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

impl Evaluator for Noop {
    fn evaluate(&self, _task: &Task, _event: &Event, _accumulator: &mut Accumulator) -> Actions {
        Vec::new()
    }
}

/// Run each evaluator in order over a shared accumulator, concatenating
/// their actions.
pub struct Sequence(pub Vec<Box<dyn Evaluator>>);

impl Sequence {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn then(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.0.push(Box::new(evaluator));
        self
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for Sequence {
    fn evaluate(&self, task: &Task, event: &Event, accumulator: &mut Accumulator) -> Actions {
        let mut actions = Vec::new();
        for evaluator in &self.0 {
            actions.extend(evaluator.evaluate(task, event, accumulator));
        }
        actions
    }
}

/// Delegate only while the predicate holds; otherwise run the alternative,
/// if any.
pub struct Filtering {
    predicate: Box<dyn Predicate>,
    delegate: Box<dyn Evaluator>,
    alternative: Option<Box<dyn Evaluator>>,
}

impl Filtering {
    pub fn new(predicate: impl Predicate + 'static, delegate: impl Evaluator + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
            delegate: Box::new(delegate),
            alternative: None,
        }
    }

    pub fn otherwise(mut self, alternative: impl Evaluator + 'static) -> Self {
        self.alternative = Some(Box::new(alternative));
        self
    }
}

impl Evaluator for Filtering {
    fn evaluate(&self, task: &Task, event: &Event, accumulator: &mut Accumulator) -> Actions {
        if self.predicate.test(task, event, accumulator) {
            self.delegate.evaluate(task, event, accumulator)
        } else if let Some(alternative) = &self.alternative {
            alternative.evaluate(task, event, accumulator)
        } else {
            Vec::new()
        }
    }
}

/// Route by `event.event_type`.
#[derive(Default)]
pub struct DispatchByEventType {
    routes: HashMap<String, Box<dyn Evaluator>>,
    default: Option<Box<dyn Evaluator>>,
}

impl DispatchByEventType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, event_type: &str, evaluator: impl Evaluator + 'static) -> Self {
        self.routes.insert(event_type.to_string(), Box::new(evaluator));
        self
    }

    pub fn or_else(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.default = Some(Box::new(evaluator));
        self
    }
}

impl Evaluator for DispatchByEventType {
    fn evaluate(&self, task: &Task, event: &Event, accumulator: &mut Accumulator) -> Actions {
        match self
            .routes
            .get(event.event_type.as_str())
            .or(self.default.as_ref())
        {
            Some(evaluator) => evaluator.evaluate(task, event, accumulator),
            None => Vec::new(),
        }
    }
}

/// Registration table keyed by task type.
#[derive(Default)]
pub struct DispatchByTaskType {
    routes: HashMap<&'static str, Box<dyn Evaluator>>,
}

impl DispatchByTaskType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, task_type: &'static str, evaluator: impl Evaluator + 'static) -> Self {
        self.routes.insert(task_type, Box::new(evaluator));
        self
    }
}

impl Evaluator for DispatchByTaskType {
    fn evaluate(&self, task: &Task, event: &Event, accumulator: &mut Accumulator) -> Actions {
        match self.routes.get(task.task_type()) {
            Some(evaluator) => evaluator.evaluate(task, event, accumulator),
            None => {
                trace!(task = %task.id, task_type = task.task_type(), "no evaluator registered");
                Vec::new()
            }
        }
    }
}

/// Copy the task's persisted status and payload into the accumulator
/// without overwriting anything already there.
#[derive(Debug, Clone, Default)]
pub struct PayloadLifting {
    exclude_keys: Vec<String>,
    exclude_event_types: Vec<String>,
}

impl PayloadLifting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn exclude_event_types<I, S>(mut self, event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_event_types
            .extend(event_types.into_iter().map(Into::into));
        self
    }
}

impl Evaluator for PayloadLifting {
    fn evaluate(&self, task: &Task, event: &Event, accumulator: &mut Accumulator) -> Actions {
        if self.exclude_event_types.contains(&event.event_type) {
            return Vec::new();
        }

        let result = accumulator.entry(&task.id);
        result.status.get_or_insert(task.status);
        result.payload.get_or_insert_with(|| task.payload.clone());

        if let Ok(Value::Object(fields)) = serde_json::to_value(&task.payload) {
            for (key, value) in fields {
                if self.exclude_keys.contains(&key) {
                    continue;
                }
                result.fields.entry(key).or_insert(value);
            }
        }
        Vec::new()
    }
}

/// Read-only lifting of tasks matching any of the given matchers.
#[derive(Default)]
pub struct Selector {
    task_type: Option<&'static str>,
    event_type: Option<String>,
    predicate: Option<Box<dyn Predicate>>,
    lifting: PayloadLifting,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_type(mut self, task_type: &'static str) -> Self {
        self.task_type = Some(task_type);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn predicate(mut self, predicate: impl Predicate + 'static) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    fn matches(&self, task: &Task, event: &Event, accumulator: &Accumulator) -> bool {
        self.task_type.is_some_and(|t| task.task_type() == t)
            || self
                .event_type
                .as_deref()
                .is_some_and(|t| event.event_type == t)
            || self
                .predicate
                .as_ref()
                .is_some_and(|p| p.test(task, event, accumulator))
    }
}

impl Evaluator for Selector {
    fn evaluate(&self, task: &Task, event: &Event, accumulator: &mut Accumulator) -> Actions {
        if self.matches(task, event, accumulator) {
            self.lifting.evaluate(task, event, accumulator);
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::predicates::{TaskStatusIn, TaskTypeEq};
    use crate::engine::{INITIATE, UPDATE};
    use crate::graph::{BuildPayload, Change, Commit, TaskPayload};
    use crate::types::TaskStatus;

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

    fn mark(label: &'static str) -> impl Evaluator {
        move |task: &Task, _: &Event, acc: &mut Accumulator| -> Actions {
            acc.entry(&task.id)
                .fields
                .insert(label.to_string(), Value::Bool(true));
            Vec::new()
        }
    }

    #[test]
    fn lifting_does_not_overwrite_existing_entries() {
        let mut acc = Accumulator::new();
        let t = task("a", TaskStatus::Ongoing);
        acc.entry("a")
            .fields
            .insert("builder".to_string(), Value::String("preset".to_string()));
        acc.entry("a").status = Some(TaskStatus::Completed);

        PayloadLifting::new()
            .exclude_keys(["bucket"])
            .evaluate(&t, &Event::update(), &mut acc);

        let result = acc.get("a").unwrap();
        assert_eq!(result.status, Some(TaskStatus::Completed));
        assert_eq!(result.fields["builder"], "preset");
        assert_eq!(result.fields["target"], "target");
        assert!(!result.fields.contains_key("bucket"));
    }

    #[test]
    fn lifting_skips_excluded_event_types() {
        let mut acc = Accumulator::new();
        PayloadLifting::new()
            .exclude_event_types([UPDATE])
            .evaluate(&task("a", TaskStatus::Pending), &Event::update(), &mut acc);
        assert!(acc.is_empty());
    }

    #[test]
    fn filtering_runs_alternative_when_predicate_fails() {
        let evaluator = Filtering::new(TaskStatusIn(vec![TaskStatus::Ongoing]), mark("delegate"))
            .otherwise(mark("alternative"));

        let mut acc = Accumulator::new();
        evaluator.evaluate(&task("a", TaskStatus::Pending), &Event::update(), &mut acc);
        evaluator.evaluate(&task("b", TaskStatus::Ongoing), &Event::update(), &mut acc);

        assert!(acc.get("a").unwrap().fields.contains_key("alternative"));
        assert!(acc.get("b").unwrap().fields.contains_key("delegate"));
    }

    #[test]
    fn dispatch_by_event_type_uses_default_for_unknown_types() {
        let evaluator = DispatchByEventType::new()
            .on(INITIATE, mark("initiate"))
            .or_else(mark("default"));

        let mut acc = Accumulator::new();
        evaluator.evaluate(&task("a", TaskStatus::Pending), &Event::initiate(), &mut acc);
        evaluator.evaluate(&task("b", TaskStatus::Pending), &Event::new("custom"), &mut acc);

        assert!(acc.get("a").unwrap().fields.contains_key("initiate"));
        assert!(acc.get("b").unwrap().fields.contains_key("default"));

        let bare = DispatchByEventType::new().on(INITIATE, mark("initiate"));
        let mut acc = Accumulator::new();
        bare.evaluate(&task("c", TaskStatus::Pending), &Event::update(), &mut acc);
        assert!(acc.is_empty());
    }

    #[test]
    fn sequence_shares_the_accumulator() {
        let seen_first = |task: &Task, _: &Event, acc: &mut Accumulator| -> Actions {
            let lifted = acc.get(&task.id).is_some_and(|r| r.fields.contains_key("first"));
            acc.entry(&task.id)
                .fields
                .insert("second_saw_first".to_string(), Value::Bool(lifted));
            Vec::new()
        };
        let evaluator = Sequence::new().then(mark("first")).then(seen_first);

        let mut acc = Accumulator::new();
        evaluator.evaluate(&task("a", TaskStatus::Pending), &Event::initiate(), &mut acc);
        assert_eq!(acc.get("a").unwrap().fields["second_saw_first"], true);
    }

    #[test]
    fn selector_lifts_matching_tasks_only() {
        let selector = Selector::new().task_type("run_test");
        let mut acc = Accumulator::new();
        selector.evaluate(&task("a", TaskStatus::Pending), &Event::select(), &mut acc);
        assert!(acc.is_empty());

        let selector = Selector::new().predicate(TaskTypeEq("find_isolate"));
        selector.evaluate(&task("a", TaskStatus::Pending), &Event::select(), &mut acc);
        assert!(acc.contains("a"));
    }
}

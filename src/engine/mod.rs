// src/engine/mod.rs

//! Evaluation engine.
//!
//! The pure half (predicates, evaluator combinators, traversal) decides what
//! should happen for an event; actions carry it out afterwards. The async
//! shell in [`runtime`] feeds external events into [`Engine::evaluate`].

pub mod accumulator;
pub mod action;
pub mod evaluate;
pub mod evaluators;
pub mod event;
pub mod predicates;
pub mod runtime;
pub mod updates;

pub use accumulator::{Accumulator, Detail, StatusReport, TaskResult};
pub use action::{Action, ActionError, FailureIsolated, MarkFailed};
pub use evaluate::{Engine, EngineSettings, Job, traverse};
pub use evaluators::{
    Actions, DispatchByEventType, DispatchByTaskType, Evaluator, Filtering, Noop, PayloadLifting,
    Selector, Sequence,
};
pub use event::{Event, INITIATE, SELECT, UPDATE};
pub use predicates::{All, Not, Predicate, TaskIsEventTarget, TaskStatusIn, TaskTypeEq, not};
pub use runtime::{EvaluationOutcome, JobRuntime, RegisteredJob, RuntimeEvent};
pub use updates::event_from_task_update;

// src/graph/mod.rs

//! Task graph data model.
//!
//! - [`model`] holds tasks, vertices, dependency edges and graph validation.
//! - [`payload`] holds the typed per-task-type payloads.
//! - [`change`] describes the source change a graph is built for.
//! - [`topo`] computes the deterministic evaluation order.

pub mod change;
pub mod model;
pub mod payload;
pub mod topo;

pub use change::{Change, Commit, Patch};
pub use model::{Dependency, GraphError, Task, TaskGraph, TaskVertex};
pub use payload::{
    ArtifactRef, BuildPayload, ErrorReason, FIND_ISOLATE, RUN_TEST, RunSummary, TaskError,
    TaskPayload, TestPayload,
};
pub use topo::DagGraph;

// src/graph/model.rs

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::payload::TaskPayload;
use crate::types::{TaskId, TaskStatus};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate task id '{0}'")]
    DuplicateVertex(TaskId),

    #[error("dependency {from} -> {to} references unknown task '{missing}'")]
    UnknownDependency {
        from: TaskId,
        to: TaskId,
        missing: TaskId,
    },

    #[error("task '{0}' cannot depend on itself")]
    SelfDependency(TaskId),

    #[error("cycle detected in task graph involving task '{0}'")]
    Cycle(TaskId),
}

/// A persisted task as seen by evaluators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub status: TaskStatus,
    pub payload: TaskPayload,
    /// Ids of the tasks this one depends on, in edge insertion order.
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    /// Bumped by the store on every write; used for compare-and-set.
    #[serde(default)]
    pub revision: u64,
}

impl Task {
    pub fn task_type(&self) -> &'static str {
        self.payload.task_type()
    }
}

/// A vertex of a graph that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskVertex {
    pub id: TaskId,
    pub payload: TaskPayload,
}

impl TaskVertex {
    pub fn new(id: impl Into<TaskId>, payload: TaskPayload) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }
}

/// `from` depends on `to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub from: TaskId,
    pub to: TaskId,
}

impl Dependency {
    pub fn new(from: impl Into<TaskId>, to: impl Into<TaskId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Graph produced by a task type's `create_graph`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskGraph {
    pub vertices: Vec<TaskVertex>,
    pub edges: Vec<Dependency>,
}

impl TaskGraph {
    pub fn new(vertices: Vec<TaskVertex>, edges: Vec<Dependency>) -> Self {
        Self { vertices, edges }
    }

    /// Append another graph's vertices and edges.
    pub fn merge(&mut self, other: TaskGraph) {
        self.vertices.extend(other.vertices);
        self.edges.extend(other.edges);
    }

    /// Check ids are unique, edges reference known vertices and there is no
    /// cycle.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut ids: HashSet<&str> = HashSet::new();
        for vertex in &self.vertices {
            if !ids.insert(vertex.id.as_str()) {
                return Err(GraphError::DuplicateVertex(vertex.id.clone()));
            }
        }
        check_acyclic(
            self.vertices.iter().map(|v| v.id.as_str()),
            self.edges.iter().map(|e| (e.from.as_str(), e.to.as_str())),
        )
    }

    /// Materialise pending tasks, collapsing duplicate edges.
    pub fn into_tasks(self) -> Vec<Task> {
        let TaskGraph { vertices, edges } = self;
        vertices
            .into_iter()
            .map(|vertex| {
                let mut dependencies: Vec<TaskId> = Vec::new();
                for edge in edges.iter().filter(|e| e.from == vertex.id) {
                    if !dependencies.contains(&edge.to) {
                        dependencies.push(edge.to.clone());
                    }
                }
                Task {
                    id: vertex.id,
                    status: TaskStatus::Pending,
                    payload: vertex.payload,
                    dependencies,
                    revision: 0,
                }
            })
            .collect()
    }
}

/// Reject unknown endpoints, self edges and cycles.
///
/// Edge direction in the check graph is dependency -> dependent, so a
/// failing toposort names a task on the cycle.
pub(crate) fn check_acyclic<'a>(
    ids: impl IntoIterator<Item = &'a str>,
    edges: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<(), GraphError> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for id in ids {
        graph.add_node(id);
    }

    for (from, to) in edges {
        for endpoint in [from, to] {
            if !graph.contains_node(endpoint) {
                return Err(GraphError::UnknownDependency {
                    from: from.to_string(),
                    to: to.to_string(),
                    missing: endpoint.to_string(),
                });
            }
        }
        if from == to {
            return Err(GraphError::SelfDependency(from.to_string()));
        }
        graph.add_edge(to, from, ());
    }

    match toposort(&graph, None) {
        Ok(_) => Ok(()),
        Err(cycle) => Err(GraphError::Cycle(cycle.node_id().to_string())),
    }
}

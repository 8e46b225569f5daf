// src/graph/topo.rs

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::graph::model::{GraphError, Task};

/// Internal node structure: insertion index plus immediate deps and
/// dependents.
#[derive(Debug, Clone)]
struct DagNode {
    index: usize,
    deps: Vec<String>,
    dependents: Vec<String>,
}

/// Adjacency view of a job's tasks used to order traversal.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: HashMap<String, DagNode>,
    order: Vec<String>,
}

impl DagGraph {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        Self::from_adjacency(
            tasks
                .iter()
                .map(|t| (t.id.as_str(), t.dependencies.iter().map(String::as_str))),
        )
    }

    /// Build from `(id, dependencies)` pairs; the iteration order is the
    /// insertion order used to break ties.
    pub fn from_adjacency<'a, I, D>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, D)>,
        D: IntoIterator<Item = &'a str>,
    {
        let mut nodes: HashMap<String, DagNode> = HashMap::new();
        let mut order = Vec::new();

        for (index, (id, deps)) in entries.into_iter().enumerate() {
            order.push(id.to_string());
            nodes.insert(
                id.to_string(),
                DagNode {
                    index,
                    deps: deps.into_iter().map(str::to_string).collect(),
                    dependents: Vec::new(),
                },
            );
        }

        for id in &order {
            let deps = nodes.get(id).map(|n| n.deps.clone()).unwrap_or_default();
            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(id.clone());
                }
            }
        }

        Self { nodes, order }
    }

    pub fn dependencies_of(&self, id: &str) -> &[String] {
        self.nodes
            .get(id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    pub fn dependents_of(&self, id: &str) -> &[String] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Dependencies before dependents; among ready tasks the one inserted
    /// first wins.
    ///
    /// Dependencies on ids outside the graph are ignored.
    pub fn evaluation_order(&self) -> Result<Vec<String>, GraphError> {
        let mut remaining: HashMap<&str, usize> = HashMap::new();
        let mut ready: BinaryHeap<Reverse<(usize, &str)>> = BinaryHeap::new();

        for (id, node) in &self.nodes {
            let known = node
                .deps
                .iter()
                .filter(|d| self.nodes.contains_key(d.as_str()))
                .count();
            if known == 0 {
                ready.push(Reverse((node.index, id.as_str())));
            } else {
                remaining.insert(id.as_str(), known);
            }
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse((_, id))) = ready.pop() {
            order.push(id.to_string());
            for dependent in self.dependents_of(id) {
                if let Some(count) = remaining.get_mut(dependent.as_str()) {
                    *count -= 1;
                    if *count == 0 {
                        remaining.remove(dependent.as_str());
                        if let Some(node) = self.nodes.get(dependent) {
                            ready.push(Reverse((node.index, dependent.as_str())));
                        }
                    }
                }
            }
        }

        if let Some(stuck) = self
            .order
            .iter()
            .find(|id| remaining.contains_key(id.as_str()))
        {
            return Err(GraphError::Cycle(stuck.clone()));
        }

        Ok(order)
    }
}

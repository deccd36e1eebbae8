// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use petgraph::Direction;

use crate::errors::{BuildError, BuilddagError, CycleError, Result};
use crate::task::{Task, TaskName};

/// Immutable dependency graph of tasks.
///
/// Node indices follow declaration order, and every ordering the graph hands
/// out breaks ties by that index, so the same configuration always yields the
/// same order.
///
/// Edge direction: dep -> task. For
///
/// ```toml
/// [task.compile]
/// after = ["generate"]
/// ```
///
/// the graph holds `generate -> compile`.
#[derive(Debug)]
pub struct TaskGraph {
    graph: DiGraph<Task, ()>,
    index: HashMap<TaskName, NodeIndex>,
    order: Vec<NodeIndex>,
}

impl TaskGraph {
    /// Build the graph, rejecting duplicate names, unknown or self
    /// dependencies and cycles.
    pub fn new(tasks: Vec<Task>) -> Result<Self> {
        let mut graph: DiGraph<Task, ()> = DiGraph::new();
        let mut index: HashMap<TaskName, NodeIndex> = HashMap::new();

        for task in tasks {
            let name = task.name().to_string();
            if index.contains_key(&name) {
                return Err(BuilddagError::ConfigError(format!(
                    "task '{name}' is declared more than once"
                )));
            }
            let idx = graph.add_node(task);
            index.insert(name, idx);
        }

        let mut edges = Vec::new();
        for idx in graph.node_indices() {
            let task = &graph[idx];
            for dep in task.deps() {
                if dep == task.name() {
                    return Err(BuilddagError::ConfigError(format!(
                        "task '{}' cannot depend on itself in `after`",
                        task.name()
                    )));
                }
                let Some(&dep_idx) = index.get(dep) else {
                    return Err(BuilddagError::ConfigError(format!(
                        "task '{}' has unknown dependency '{}' in `after`",
                        task.name(),
                        dep
                    )));
                };
                edges.push((dep_idx, idx));
            }
        }
        for (from, to) in edges {
            graph.update_edge(from, to, ());
        }

        let cycle = cycle_members(&graph);
        if !cycle.is_empty() {
            return Err(CycleError {
                tasks: cycle
                    .into_iter()
                    .map(|idx| graph[idx].name().to_string())
                    .collect(),
            }
            .into());
        }

        let order = stable_toposort(&graph);
        Ok(Self {
            graph,
            index,
            order,
        })
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.index.get(name).map(|&idx| &self.graph[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All tasks in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    /// Every task, dependencies first; ties broken by declaration order.
    pub fn topological_order(&self) -> Vec<&Task> {
        self.order.iter().map(|&idx| &self.graph[idx]).collect()
    }

    /// `target` and its transitive dependencies, in topological order.
    pub fn execution_order(&self, target: &str) -> std::result::Result<Vec<&Task>, BuildError> {
        let &start = self
            .index
            .get(target)
            .ok_or_else(|| BuildError::UnknownTask(target.to_string()))?;

        let reversed = Reversed(&self.graph);
        let mut needed = HashSet::new();
        let mut dfs = Dfs::new(reversed, start);
        while let Some(idx) = dfs.next(reversed) {
            needed.insert(idx);
        }

        Ok(self
            .order
            .iter()
            .filter(|idx| needed.contains(idx))
            .map(|&idx| &self.graph[idx])
            .collect())
    }

    /// Immediate dependencies (the task's `after` list), in declaration order.
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Immediate dependents, in declaration order.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Outgoing)
    }

    fn neighbors(&self, name: &str, dir: Direction) -> Vec<&str> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        let mut found: Vec<NodeIndex> = self.graph.neighbors_directed(idx, dir).collect();
        found.sort();
        found.dedup();
        found.into_iter().map(|n| self.graph[n].name()).collect()
    }
}

/// Nodes that sit on a cycle, sorted by index. Empty for a DAG.
pub fn cycle_members<N, E>(graph: &DiGraph<N, E>) -> Vec<NodeIndex> {
    let mut members: Vec<NodeIndex> = kosaraju_scc(graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || graph.find_edge(component[0], component[0]).is_some()
        })
        .flatten()
        .collect();
    members.sort();
    members
}

/// Kahn's algorithm with a min-heap on node index.
fn stable_toposort<N, E>(graph: &DiGraph<N, E>) -> Vec<NodeIndex> {
    let mut in_degree: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|idx| {
            (
                idx,
                graph.neighbors_directed(idx, Direction::Incoming).count(),
            )
        })
        .collect();

    let mut ready: BinaryHeap<Reverse<NodeIndex>> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(&idx, _)| Reverse(idx))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse(idx)) = ready.pop() {
        order.push(idx);
        for next in graph.neighbors_directed(idx, Direction::Outgoing) {
            if let Some(deg) = in_degree.get_mut(&next) {
                *deg -= 1;
                if *deg == 0 {
                    ready.push(Reverse(next));
                }
            }
        }
    }
    order
}

//! Task dependency graph --
//!
//! Directed graph over [`TaskHandle`] nodes describing how tasks depend on
//! each other. An edge always reads "source depends on target": the source
//! task's activation (or processing window) is gated on the target task's
//! progress. The graph is the input to [`crate::compiler::compile`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::task::TaskHandle;

/// Error raised while assembling a task dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// An edge attribute spelling that names no known [`EdgeKind`]. Rejection
    /// is isolated to the one edge carrying the spelling.
    #[error("unsupported edge type '{0}'")]
    UnsupportedEdgeType(String),
    #[error("duplicate {kind} edge between node {dependent} and node {dependency}")]
    DuplicateEdge { kind: EdgeKind, dependent: usize, dependency: usize },
    #[error("graph node index {0} out of bounds")]
    UnknownNode(usize),
}

/// The kind of dependency an edge expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    SubtaskMandatory,
    SubtaskOptional,
    Sequence,
    SequenceAnd,
    SequenceOr,
    ConditionalFalse,
    ConditionalCorrect,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdgeKind::SubtaskMandatory => "subtask_mandatory",
            EdgeKind::SubtaskOptional => "subtask_optional",
            EdgeKind::Sequence => "sequence",
            EdgeKind::SequenceAnd => "sequence_and",
            EdgeKind::SequenceOr => "sequence_or",
            EdgeKind::ConditionalFalse => "conditional_false",
            EdgeKind::ConditionalCorrect => "conditional_correct",
        };
        write!(f, "{name}")
    }
}

impl FromStr for EdgeKind {
    type Err = GraphError;

    /// Maps the attribute spellings accepted in graph definitions, including
    /// the short forms used by authors.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subtask_mandatory" | "st_m" => Ok(EdgeKind::SubtaskMandatory),
            "subtask_optional" | "st_o" => Ok(EdgeKind::SubtaskOptional),
            "sequence" | "seq" => Ok(EdgeKind::Sequence),
            "sequence_and" | "seq_and" => Ok(EdgeKind::SequenceAnd),
            "sequence_or" | "seq_or" => Ok(EdgeKind::SequenceOr),
            "conditional_false" | "c_f" => Ok(EdgeKind::ConditionalFalse),
            "conditional_correct" | "c_c" => Ok(EdgeKind::ConditionalCorrect),
            other => Err(GraphError::UnsupportedEdgeType(other.to_string())),
        }
    }
}

/// A dependency between two graph nodes, by node index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskEdge {
    pub kind: EdgeKind,
    /// The dependent task.
    pub source: usize,
    /// The task the source depends on.
    pub target: usize,
}

/// Directed task dependency graph with insertion-ordered nodes.
#[derive(Debug, Clone, Default)]
pub struct TaskDependencyGraph {
    nodes: Vec<TaskHandle>,
    edges: Vec<TaskEdge>,
}

impl TaskDependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task node, returning its index. Adding a handle whose task id is
    /// already present returns the existing index instead of duplicating the
    /// node.
    pub fn add_task(&mut self, task: TaskHandle) -> usize {
        let id = task.borrow().id;
        if let Some(index) = self.node_index(id) {
            return index;
        }
        self.nodes.push(task);
        self.nodes.len() - 1
    }

    pub fn node_index(&self, id: Uuid) -> Option<usize> {
        self.nodes.iter().position(|t| t.borrow().id == id)
    }

    /// Add an edge between two nodes.
    ///
    /// # Errors
    /// - [`GraphError::UnknownNode`] if either index is out of bounds
    /// - [`GraphError::DuplicateEdge`] if an edge of the same kind already
    ///   connects the pair in either direction
    pub fn add_edge(&mut self, kind: EdgeKind, source: usize, target: usize) -> Result<(), GraphError> {
        for index in [source, target] {
            if index >= self.nodes.len() {
                return Err(GraphError::UnknownNode(index));
            }
        }
        let duplicated = self.edges.iter().any(|e| {
            e.kind == kind
                && ((e.source == source && e.target == target)
                    || (e.source == target && e.target == source))
        });
        if duplicated {
            return Err(GraphError::DuplicateEdge { kind, dependent: source, dependency: target });
        }
        self.edges.push(TaskEdge { kind, source, target });
        Ok(())
    }

    pub fn task(&self, index: usize) -> Option<&TaskHandle> {
        self.nodes.get(index)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskHandle> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> &[TaskEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    fn handle(name: &str) -> TaskHandle {
        Task::new(name).into_handle()
    }

    #[test]
    fn edge_kind_spellings() {
        assert_eq!("seq".parse::<EdgeKind>(), Ok(EdgeKind::Sequence));
        assert_eq!("sequence_or".parse::<EdgeKind>(), Ok(EdgeKind::SequenceOr));
        assert_eq!(
            "st_m".parse::<EdgeKind>(),
            Ok(EdgeKind::SubtaskMandatory)
        );
        assert_eq!(
            "parallel".parse::<EdgeKind>(),
            Err(GraphError::UnsupportedEdgeType("parallel".into()))
        );
    }

    #[test]
    fn add_task_dedupes_by_id() {
        let mut graph = TaskDependencyGraph::new();
        let a = handle("a");
        let first = graph.add_task(a.clone());
        let second = graph.add_task(a);
        assert_eq!(first, second);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn duplicate_edges_rejected_in_both_directions() {
        let mut graph = TaskDependencyGraph::new();
        let a = graph.add_task(handle("a"));
        let b = graph.add_task(handle("b"));
        graph.add_edge(EdgeKind::Sequence, a, b).expect("first edge");
        assert_eq!(
            graph.add_edge(EdgeKind::Sequence, a, b),
            Err(GraphError::DuplicateEdge { kind: EdgeKind::Sequence, dependent: a, dependency: b })
        );
        assert!(matches!(
            graph.add_edge(EdgeKind::Sequence, b, a),
            Err(GraphError::DuplicateEdge { .. })
        ));
        // a different kind between the same pair is a distinct dependency
        graph
            .add_edge(EdgeKind::ConditionalCorrect, a, b)
            .expect("different kind allowed");
    }

    #[test]
    fn edge_bounds_checked() {
        let mut graph = TaskDependencyGraph::new();
        let a = graph.add_task(handle("a"));
        assert_eq!(
            graph.add_edge(EdgeKind::Sequence, a, 7),
            Err(GraphError::UnknownNode(7))
        );
    }
}

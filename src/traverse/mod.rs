//! Traversal: partition the judged graph into batches and stratify them.

pub mod batching;
pub mod difficulty;
pub mod strategy;

use std::collections::HashSet;

use serde::Serialize;

use crate::graph::{Edge, Node};

pub use batching::get_batches;
pub use difficulty::{assign_difficulty, batch_loss};
pub use strategy::{EdgeSampling, ExpandMethod, IsolatedNodeStrategy, TraverseStrategy};

/// A connected slice of the graph handed to QA rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Set by [`assign_difficulty`].
    pub loss: f64,
    /// Set by [`assign_difficulty`].
    pub difficulty: Option<String>,
}

impl Batch {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges, loss: 0.0, difficulty: None }
    }

    /// Tokens of all nodes and edges; unset lengths count as 0.
    pub fn token_count(&self) -> usize {
        let nodes: usize = self.nodes.iter().map(|n| n.token_length.unwrap_or(0)).sum();
        let edges: usize = self.edges.iter().map(|e| e.token_length.unwrap_or(0)).sum();
        nodes + edges
    }

    /// Ids of every node in the batch.
    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }
}

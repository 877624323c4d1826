//! Batching engine: partitions the graph's edges into traversal batches.
//!
//! The edge list is ordered once by the strategy's sampling mode. Every edge
//! is then visited in that order; an unvisited edge seeds a batch that grows
//! outward level by level from a frontier of nodes until the width or token
//! budget, or the depth limit, is exhausted. An edge belongs to exactly one
//! batch. Nodes may repeat across batches.
//!
//! Within a level, competing candidates are taken in the same global order,
//! so the sampling mode also decides who wins a tight budget.

use std::collections::{BTreeSet, HashMap, HashSet};

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, info, warn};

use crate::graph::{Edge, Node};
use crate::traverse::strategy::{EdgeSampling, ExpandMethod, IsolatedNodeStrategy, TraverseStrategy};
use crate::traverse::Batch;

/// Partition `edges` into batches according to `strategy`.
///
/// Missing `loss` sorts as 0 and missing `token_length` counts as 0 tokens.
/// Edge endpoints absent from `nodes` are represented by `UNKNOWN`
/// placeholders.
pub fn get_batches(nodes: &[Node], edges: &[Edge], strategy: &TraverseStrategy) -> Vec<Batch> {
    info!(
        expand_method = %strategy.expand_method,
        edge_sampling = %strategy.edge_sampling,
        nodes = nodes.len(),
        edges = edges.len(),
        "partitioning graph into batches"
    );

    let ordered = order_edges(edges, strategy);
    let engine = Engine::new(nodes, ordered, strategy);
    let mut batches = engine.run();

    if strategy.isolated_node_strategy == IsolatedNodeStrategy::Add {
        let covered: HashSet<&str> = batches
            .iter()
            .flat_map(|b| b.nodes.iter().map(|n| n.id.as_str()))
            .collect();
        let isolated: Vec<Node> = nodes
            .iter()
            .filter(|n| !covered.contains(n.id.as_str()))
            .cloned()
            .collect();
        debug!(isolated = isolated.len(), "adding isolated nodes");
        batches.extend(isolated.into_iter().map(|n| Batch::new(vec![n], Vec::new())));
    }

    info!(batches = batches.len(), "batching complete");
    batches
}

/// Edges in sampling order. Sorts are stable, so equal losses keep input order.
fn order_edges<'a>(edges: &'a [Edge], strategy: &TraverseStrategy) -> Vec<&'a Edge> {
    let mut ordered: Vec<&Edge> = edges.iter().collect();
    let loss = |e: &Edge| e.loss.unwrap_or(0.0);
    match strategy.edge_sampling {
        EdgeSampling::MaxLoss => ordered.sort_by(|a, b| loss(b).total_cmp(&loss(a))),
        EdgeSampling::MinLoss => ordered.sort_by(|a, b| loss(a).total_cmp(&loss(b))),
        EdgeSampling::Random => {
            let mut rng = match strategy.seed {
                Some(seed) => ChaCha20Rng::seed_from_u64(seed),
                None => ChaCha20Rng::from_entropy(),
            };
            ordered.shuffle(&mut rng);
        }
    }
    ordered
}

/// Per-call traversal state. Edges are addressed by their rank in sampling order.
struct Engine<'a> {
    strategy: &'a TraverseStrategy,
    edges: Vec<&'a Edge>,
    /// Node id → ranks of incident edges, ascending.
    adjacency: HashMap<&'a str, Vec<usize>>,
    node_memo: HashMap<&'a str, &'a Node>,
    visited: Vec<bool>,
}

impl<'a> Engine<'a> {
    fn new(nodes: &'a [Node], edges: Vec<&'a Edge>, strategy: &'a TraverseStrategy) -> Self {
        let mut adjacency: HashMap<&str, Vec<usize>> = HashMap::new();
        for (rank, edge) in edges.iter().enumerate() {
            adjacency.entry(edge.src_id.as_str()).or_default().push(rank);
            if edge.tgt_id != edge.src_id {
                adjacency.entry(edge.tgt_id.as_str()).or_default().push(rank);
            }
        }
        let node_memo = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let visited = vec![false; edges.len()];
        Self { strategy, edges, adjacency, node_memo, visited }
    }

    fn run(mut self) -> Vec<Batch> {
        let mut batches = Vec::new();
        for seed in 0..self.edges.len() {
            if self.visited[seed] {
                continue;
            }
            self.visited[seed] = true;

            let extra = match self.strategy.expand_method {
                ExpandMethod::MaxWidth => self.expand_by_width(seed),
                ExpandMethod::MaxTokens => self.expand_by_tokens(seed),
            };

            let mut ranks = Vec::with_capacity(extra.len() + 1);
            ranks.push(seed);
            ranks.extend(extra);
            batches.push(self.assemble(&ranks));
        }
        batches
    }

    /// Starting frontier for the seed edge: `{tgt}` or `{src, tgt}`.
    fn initial_frontier(&self, seed: usize) -> BTreeSet<&'a str> {
        let edge = self.edges[seed];
        let mut frontier = BTreeSet::from([edge.tgt_id.as_str()]);
        if self.strategy.bidirectional {
            frontier.insert(edge.src_id.as_str());
        }
        frontier
    }

    /// Unvisited edges incident to the frontier, deduplicated, in rank order.
    fn candidates(&self, frontier: &BTreeSet<&'a str>) -> Vec<usize> {
        let found: BTreeSet<usize> = frontier
            .iter()
            .filter_map(|id| self.adjacency.get(id))
            .flatten()
            .copied()
            .filter(|&rank| !self.visited[rank])
            .collect();
        found.into_iter().collect()
    }

    /// Endpoints of `ranks` that are not already in `frontier`.
    fn advance(&self, frontier: &BTreeSet<&'a str>, ranks: &[usize]) -> BTreeSet<&'a str> {
        ranks
            .iter()
            .flat_map(|&r| [self.edges[r].src_id.as_str(), self.edges[r].tgt_id.as_str()])
            .filter(|id| !frontier.contains(id))
            .collect()
    }

    fn expand_by_width(&mut self, seed: usize) -> Vec<usize> {
        let mut budget = self.strategy.max_extra_edges;
        let mut depth = self.strategy.max_depth;
        let mut frontier = self.initial_frontier(seed);
        let mut picked = Vec::new();

        while depth > 0 && budget > 0 {
            depth -= 1;
            let candidates = self.candidates(&frontier);
            if candidates.is_empty() {
                break;
            }
            if candidates.len() >= budget {
                for &rank in &candidates[..budget] {
                    self.visited[rank] = true;
                    picked.push(rank);
                }
                break;
            }
            budget -= candidates.len();
            for &rank in &candidates {
                self.visited[rank] = true;
                picked.push(rank);
            }
            frontier = self.advance(&frontier, &candidates);
        }
        picked
    }

    fn expand_by_tokens(&mut self, seed: usize) -> Vec<usize> {
        let seed_edge = self.edges[seed];
        let mut budget = self.strategy.max_tokens as i64
            - edge_tokens(seed_edge)
            - self.node_tokens(&seed_edge.src_id)
            - self.node_tokens(&seed_edge.tgt_id);
        let mut depth = self.strategy.max_depth;
        let mut frontier = self.initial_frontier(seed);
        let mut in_batch: HashSet<&str> = HashSet::from([seed_edge.src_id.as_str(), seed_edge.tgt_id.as_str()]);
        let mut picked = Vec::new();

        while depth > 0 && budget > 0 {
            depth -= 1;
            let candidates = self.candidates(&frontier);
            if candidates.is_empty() {
                break;
            }
            for &rank in &candidates {
                let edge = self.edges[rank];
                let mut cost = edge_tokens(edge);
                for id in [edge.src_id.as_str(), edge.tgt_id.as_str()] {
                    if !in_batch.contains(id) {
                        cost += self.node_tokens(id);
                    }
                }
                budget -= cost;
                if budget < 0 {
                    return picked;
                }
                self.visited[rank] = true;
                picked.push(rank);
                in_batch.insert(edge.src_id.as_str());
                in_batch.insert(edge.tgt_id.as_str());
            }
            frontier = self.advance(&frontier, &candidates);
        }
        picked
    }

    fn node_tokens(&self, id: &str) -> i64 {
        self.node_memo.get(id).and_then(|n| n.token_length).unwrap_or(0) as i64
    }

    fn node(&self, id: &str) -> Node {
        match self.node_memo.get(id) {
            Some(node) => (*node).clone(),
            None => {
                warn!(node = id, "edge endpoint missing from node list, using placeholder");
                Node::placeholder(id)
            }
        }
    }

    /// Batch from edge ranks: endpoint nodes deduplicated by id, edges by pair,
    /// both in first-seen order.
    fn assemble(&self, ranks: &[usize]) -> Batch {
        let mut seen_nodes = HashSet::new();
        let mut seen_edges = HashSet::new();
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for &rank in ranks {
            let edge = self.edges[rank];
            for id in [edge.src_id.as_str(), edge.tgt_id.as_str()] {
                if seen_nodes.insert(id) {
                    nodes.push(self.node(id));
                }
            }
            if seen_edges.insert(edge.key()) {
                edges.push(edge.clone());
            }
        }
        Batch::new(nodes, edges)
    }
}

fn edge_tokens(edge: &Edge) -> i64 {
    edge.token_length.unwrap_or(0) as i64
}

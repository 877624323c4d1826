//! `GraphStore`: persistent undirected property graph.
//!
//! Nodes are keyed by id and edges by their sorted endpoint pair, both in
//! `BTreeMap`s so every listing comes out in a deterministic order. Entity and
//! relation merges are read-merge-upsert in the caller, which must serialize
//! writes for the same key. Edge endpoints are the exception: several relation
//! merges can touch one endpoint at once, so [`GraphStore::merge_placeholder`]
//! folds into it under the write lock.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AppError;
use crate::graph::{Edge, EdgeKey, Node, UNKNOWN_ENTITY_TYPE, join_descriptions};

const GRAPH_FILE: &str = "graph.json";

#[derive(Default)]
struct GraphData {
    nodes: BTreeMap<String, Node>,
    edges: BTreeMap<EdgeKey, Edge>,
}

/// On-disk shape of `graph.json`.
#[derive(Serialize, Deserialize)]
struct GraphFile {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

pub struct GraphStore {
    path: PathBuf,
    inner: RwLock<GraphData>,
}

impl GraphStore {
    /// Open `{working_dir}/graph.json`; an absent file yields an empty graph.
    pub fn open(working_dir: &Path) -> Result<Self, AppError> {
        fs::create_dir_all(working_dir).map_err(|e| {
            AppError::Storage(format!("graph: cannot create {}: {e}", working_dir.display()))
        })?;
        let path = working_dir.join(GRAPH_FILE);
        let data = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| AppError::Storage(format!("graph: read graph.json: {e}")))?;
            let file: GraphFile = serde_json::from_str(&raw)
                .map_err(|e| AppError::Storage(format!("graph: parse graph.json: {e}")))?;
            GraphData {
                nodes: file.nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
                edges: file.edges.into_iter().map(|e| (e.key(), e)).collect(),
            }
        } else {
            GraphData::default()
        };
        info!(nodes = data.nodes.len(), edges = data.edges.len(), "graph store opened");
        Ok(Self { path, inner: RwLock::new(data) })
    }

    pub fn get_node(&self, id: &str) -> Result<Option<Node>, AppError> {
        Ok(self.read()?.nodes.get(id).cloned())
    }

    pub fn has_node(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.read()?.nodes.contains_key(id))
    }

    /// All nodes ordered by id.
    pub fn get_all_nodes(&self) -> Result<Vec<Node>, AppError> {
        Ok(self.read()?.nodes.values().cloned().collect())
    }

    /// Insert or replace the node stored under `node.id`.
    pub fn upsert_node(&self, node: Node) -> Result<(), AppError> {
        self.write()?.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Create `id` as an `UNKNOWN` endpoint carrying `description` and
    /// `source_ids`, or fold both into it if it is still `UNKNOWN`. Typed
    /// entities are left untouched.
    pub fn merge_placeholder(
        &self,
        id: &str,
        description: &str,
        source_ids: &BTreeSet<String>,
    ) -> Result<(), AppError> {
        let mut data = self.write()?;
        match data.nodes.get_mut(id) {
            None => {
                debug!(node = id, "creating placeholder endpoint");
                let mut node = Node::placeholder(id);
                node.description = join_descriptions([description]);
                node.source_ids = source_ids.clone();
                data.nodes.insert(id.to_string(), node);
            }
            Some(node) if node.entity_type == UNKNOWN_ENTITY_TYPE => {
                let joined = join_descriptions([node.description.as_str(), description]);
                if joined != node.description {
                    node.description = joined;
                    node.token_length = None;
                }
                node.source_ids.extend(source_ids.iter().cloned());
            }
            Some(_) => {}
        }
        Ok(())
    }

    pub fn get_edge(&self, a: &str, b: &str) -> Result<Option<Edge>, AppError> {
        Ok(self.read()?.edges.get(&EdgeKey::new(a, b)).cloned())
    }

    pub fn has_edge(&self, a: &str, b: &str) -> Result<bool, AppError> {
        Ok(self.read()?.edges.contains_key(&EdgeKey::new(a, b)))
    }

    /// All edges ordered by sorted endpoint pair.
    pub fn get_all_edges(&self) -> Result<Vec<Edge>, AppError> {
        Ok(self.read()?.edges.values().cloned().collect())
    }

    /// Edges incident to `id`.
    pub fn node_edges(&self, id: &str) -> Result<Vec<Edge>, AppError> {
        Ok(self.read()?.edges.values().filter(|e| e.key().touches(id)).cloned().collect())
    }

    /// Insert or update an edge. Endpoints missing from the graph are created
    /// as `UNKNOWN` placeholders in the same critical section.
    pub fn upsert_edge(&self, edge: Edge) -> Result<(), AppError> {
        let mut data = self.write()?;
        for id in [&edge.src_id, &edge.tgt_id] {
            if !data.nodes.contains_key(id) {
                debug!(node = %id, "creating placeholder endpoint");
                data.nodes.insert(id.clone(), Node::placeholder(id.clone()));
            }
        }
        data.edges.insert(edge.key(), edge);
        Ok(())
    }

    /// Set the judge loss on an existing edge.
    pub fn update_edge_loss(&self, key: &EdgeKey, loss: f64) -> Result<(), AppError> {
        let mut data = self.write()?;
        let edge = data
            .edges
            .get_mut(key)
            .ok_or_else(|| AppError::Storage(format!("graph: no edge {key}")))?;
        edge.loss = Some(loss);
        Ok(())
    }

    pub fn node_count(&self) -> Result<usize, AppError> {
        Ok(self.read()?.nodes.len())
    }

    pub fn edge_count(&self) -> Result<usize, AppError> {
        Ok(self.read()?.edges.len())
    }

    /// Persist the whole graph to `graph.json`.
    pub fn flush(&self) -> Result<(), AppError> {
        let data = self.read()?;
        let file = GraphFile {
            nodes: data.nodes.values().cloned().collect(),
            edges: data.edges.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| AppError::Storage(format!("graph: serialize graph: {e}")))?;
        fs::write(&self.path, json)
            .map_err(|e| AppError::Storage(format!("graph: write graph.json: {e}")))?;
        debug!(nodes = file.nodes.len(), edges = file.edges.len(), "graph flushed");
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, GraphData>, AppError> {
        self.inner.read().map_err(|_| AppError::Storage("graph: lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, GraphData>, AppError> {
        self.inner.write().map_err(|_| AppError::Storage("graph: lock poisoned".into()))
    }
}

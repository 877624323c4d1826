//! Knowledge-graph records: entities (nodes) and undirected relations (edges).
//!
//! Records are produced by extraction, reconciled by [`merge`], annotated by
//! the judge (edge `loss`) and by pre-tokenization (`token_length`), and read
//! by the batching engine.

pub mod merge;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Entity type given to endpoints that an edge references before the entity
/// itself has been extracted.
pub const UNKNOWN_ENTITY_TYPE: &str = "UNKNOWN";

/// Separator between merged descriptions.
pub const GRAPH_FIELD_SEP: &str = "<SEP>";

/// Union of description fragments: every input is split on
/// [`GRAPH_FIELD_SEP`], blanks are dropped and the distinct pieces are joined
/// back in sorted order.
pub fn join_descriptions<'a>(descriptions: impl IntoIterator<Item = &'a str>) -> String {
    let pieces: BTreeSet<&str> = descriptions
        .into_iter()
        .flat_map(|d| d.split(GRAPH_FIELD_SEP))
        .filter(|d| !d.trim().is_empty())
        .collect();
    pieces.into_iter().collect::<Vec<_>>().join(GRAPH_FIELD_SEP)
}

/// An entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Canonical entity name, globally unique.
    pub id: String,
    pub entity_type: String,
    pub description: String,
    /// Chunk ids the entity was extracted from.
    #[serde(default)]
    pub source_ids: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_length: Option<usize>,
    /// Reserved for a node-level judge. Nothing populates it today; the
    /// stratifier counts `None` as 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss: Option<f64>,
}

impl Node {
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            description: description.into(),
            source_ids: BTreeSet::new(),
            token_length: None,
            loss: None,
        }
    }

    /// Placeholder for an edge endpoint not yet seen as an entity.
    pub fn placeholder(id: impl Into<String>) -> Self {
        Self::new(id, UNKNOWN_ENTITY_TYPE, "")
    }
}

/// Unordered endpoint pair. `(A, B)` and `(B, A)` produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub src: String,
    pub tgt: String,
}

impl EdgeKey {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b { Self { src: a, tgt: b } } else { Self { src: b, tgt: a } }
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.src == node_id || self.tgt == node_id
    }
}

impl std::fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -- {}", self.src, self.tgt)
    }
}

/// A relation between two entities. `src_id <= tgt_id` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub src_id: String,
    pub tgt_id: String,
    pub description: String,
    #[serde(default)]
    pub source_ids: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_length: Option<usize>,
    /// Comprehension loss assigned by the judge; `None` until judged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss: Option<f64>,
}

impl Edge {
    pub fn new(a: impl Into<String>, b: impl Into<String>, description: impl Into<String>) -> Self {
        let key = EdgeKey::new(a, b);
        Self {
            src_id: key.src,
            tgt_id: key.tgt,
            description: description.into(),
            source_ids: BTreeSet::new(),
            token_length: None,
            loss: None,
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.src_id.clone(), self.tgt_id.clone())
    }
}

/// Candidate entity emitted by extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub name: String,
    pub entity_type: String,
    pub description: String,
    pub source_id: String,
}

/// Candidate relation emitted by extraction. Endpoint order is not significant.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationRecord {
    pub src_id: String,
    pub tgt_id: String,
    pub description: String,
    pub source_id: String,
}

impl RelationRecord {
    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.src_id.clone(), self.tgt_id.clone())
    }
}

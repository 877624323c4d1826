//! Merger: reconciles extracted records with what the graph already holds.
//!
//! For one key (entity name or sorted endpoint pair) the merge reads the
//! stored record, folds in the candidates, optionally summarizes, and writes
//! back. Callers must not run two merges for the same key concurrently.
//! Stored descriptions are split on the separator before the union, so
//! merging the same records again leaves the record unchanged.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::graph::{
    Edge, EdgeKey, EntityRecord, GRAPH_FIELD_SEP, Node, RelationRecord, UNKNOWN_ENTITY_TYPE, join_descriptions,
};
use crate::llm::{GenerateParams, LlmProvider};
use crate::prompts;
use crate::storage::GraphStore;
use crate::tokenizer::Tokenizer;

#[derive(Clone)]
pub struct Merger {
    graph: Arc<GraphStore>,
    llm: LlmProvider,
    tokenizer: Arc<dyn Tokenizer>,
    max_summary_tokens: usize,
}

impl Merger {
    pub fn new(
        graph: Arc<GraphStore>,
        llm: LlmProvider,
        tokenizer: Arc<dyn Tokenizer>,
        max_summary_tokens: usize,
    ) -> Self {
        Self { graph, llm, tokenizer, max_summary_tokens }
    }

    /// Merge `records` into the node `entity_id` and store the result.
    pub async fn merge_nodes(&self, entity_id: &str, records: &[EntityRecord]) -> Result<Node, AppError> {
        let existing = self.graph.get_node(entity_id)?;

        let mut types: Vec<&str> = records.iter().map(|r| r.entity_type.as_str()).collect();
        let mut descriptions: Vec<&str> = records.iter().map(|r| r.description.as_str()).collect();
        let mut source_ids: BTreeSet<String> = records.iter().map(|r| r.source_id.clone()).collect();
        if let Some(node) = &existing {
            types.push(&node.entity_type);
            descriptions.push(&node.description);
            source_ids.extend(node.source_ids.iter().cloned());
        }

        let entity_type = majority_type(&types);
        let joined = join_descriptions(descriptions);
        let description = self.summarize(entity_id, joined).await;

        let mut node = existing.unwrap_or_else(|| Node::new(entity_id, UNKNOWN_ENTITY_TYPE, ""));
        if node.description != description {
            node.token_length = None;
        }
        node.entity_type = entity_type;
        node.description = description;
        node.source_ids = source_ids;

        self.graph.upsert_node(node.clone())?;
        debug!(entity = entity_id, sources = node.source_ids.len(), "node merged");
        Ok(node)
    }

    /// Merge `records` into the edge between `src` and `tgt` and store it.
    /// Endpoints the graph does not know yet become `UNKNOWN` nodes carrying
    /// the relation's description and provenance.
    pub async fn merge_edges(&self, src: &str, tgt: &str, records: &[RelationRecord]) -> Result<Edge, AppError> {
        let key = EdgeKey::new(src, tgt);
        let existing = self.graph.get_edge(&key.src, &key.tgt)?;

        let mut descriptions: Vec<&str> = records.iter().map(|r| r.description.as_str()).collect();
        let mut source_ids: BTreeSet<String> = records.iter().map(|r| r.source_id.clone()).collect();
        if let Some(edge) = &existing {
            descriptions.push(&edge.description);
            source_ids.extend(edge.source_ids.iter().cloned());
        }
        let joined = join_descriptions(descriptions);

        for id in [&key.src, &key.tgt] {
            self.graph.merge_placeholder(id, &joined, &source_ids)?;
        }

        let description = self.summarize(&format!("({}, {})", key.src, key.tgt), joined).await;

        let mut edge = existing.unwrap_or_else(|| Edge::new(key.src.clone(), key.tgt.clone(), ""));
        if edge.description != description {
            // A changed statement invalidates its cached length and judgement.
            edge.token_length = None;
            edge.loss = None;
        }
        edge.description = description;
        edge.source_ids = source_ids;

        self.graph.upsert_edge(edge.clone())?;
        debug!(edge = %key, sources = edge.source_ids.len(), "edge merged");
        Ok(edge)
    }

    /// Summarize `description` once it reaches `max_summary_tokens`.
    ///
    /// The text is truncated to the threshold first; if the LLM call fails the
    /// truncated text is kept.
    async fn summarize(&self, name: &str, description: String) -> String {
        let tokens = self.tokenizer.count(&description);
        if tokens < self.max_summary_tokens {
            return description;
        }

        let truncated = self.tokenizer.truncate(&description, self.max_summary_tokens);
        let list = truncated
            .split(GRAPH_FIELD_SEP)
            .map(|d| format!("- {}", d.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = prompts::render(
            prompts::DESCRIPTION_SUMMARIZATION,
            &[("entity_name", name), ("description_list", &list)],
        );

        match self.llm.generate_answer(&prompt, &GenerateParams::default()).await {
            Ok(summary) => {
                info!(name, tokens, "description summarized");
                summary
            }
            Err(e) => {
                warn!(name, error = %e, "summarization failed, keeping truncated description");
                truncated
            }
        }
    }
}

/// Most frequent type; ties go to the type seen first.
fn majority_type(types: &[&str]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for &t in types {
        *counts.entry(t).or_default() += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for &t in types {
        let n = counts[t];
        if best.is_none_or(|(_, m)| n > m) {
            best = Some((t, n));
        }
    }
    best.map(|(t, _)| t.to_string()).unwrap_or_else(|| UNKNOWN_ENTITY_TYPE.to_string())
}

//! Insert stage: documents in, knowledge graph out.
//!
//! New documents are chunked and stored, each new chunk is sent once through
//! the extraction prompt, and the parsed records are merged into the graph.
//! All nodes are merged before any edge so edge endpoints resolve to real
//! entities rather than placeholders.

pub mod chunk;
pub mod extract;

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::graph::merge::Merger;
use crate::graph::{EdgeKey, EntityRecord, RelationRecord};
use crate::llm::{GenerateParams, LlmProvider};
use crate::prompts;
use crate::tasks;

pub use chunk::{ChunkRecord, DocumentRecord, InputData, InputText, split_chunks};
pub use extract::{Extraction, parse_extraction};

/// Run the extraction prompt over every chunk. Chunks whose call fails are
/// logged and contribute nothing.
pub async fn extract_chunks(
    llm: &LlmProvider,
    chunks: &BTreeMap<String, ChunkRecord>,
    limit: &Arc<Semaphore>,
) -> Extraction {
    let mut set: JoinSet<Result<Extraction, AppError>> = JoinSet::new();
    for (chunk_id, chunk) in chunks {
        let llm = llm.clone();
        let limit = limit.clone();
        let chunk_id = chunk_id.clone();
        let prompt = prompts::kg_extraction(&chunk.content);
        set.spawn(async move {
            let _permit = tasks::acquire(&limit).await?;
            let output = llm.generate_answer(&prompt, &GenerateParams::default()).await?;
            let ex = parse_extraction(&output, &chunk_id);
            debug!(chunk = %chunk_id, entities = ex.entities.len(), relations = ex.relations.len(), "chunk extracted");
            Ok(ex)
        });
    }

    let mut all = Extraction::default();
    for ex in tasks::collect(set, "extract").await {
        all.entities.extend(ex.entities);
        all.relations.extend(ex.relations);
    }
    all
}

/// Merge `extraction` into the graph, one task per entity name and then one
/// per endpoint pair. Returns `(nodes, edges)` merged.
pub async fn merge_extraction(
    merger: &Merger,
    extraction: Extraction,
    limit: &Arc<Semaphore>,
) -> (usize, usize) {
    let mut by_name: BTreeMap<String, Vec<EntityRecord>> = BTreeMap::new();
    for record in extraction.entities {
        by_name.entry(record.name.clone()).or_default().push(record);
    }
    let mut by_pair: BTreeMap<EdgeKey, Vec<RelationRecord>> = BTreeMap::new();
    for record in extraction.relations {
        by_pair.entry(record.key()).or_default().push(record);
    }

    let mut set = JoinSet::new();
    for (name, records) in by_name {
        let merger = merger.clone();
        let limit = limit.clone();
        set.spawn(async move {
            let _permit = tasks::acquire(&limit).await?;
            merger.merge_nodes(&name, &records).await
        });
    }
    let nodes = tasks::collect(set, "merge nodes").await.len();

    let mut set = JoinSet::new();
    for (key, records) in by_pair {
        let merger = merger.clone();
        let limit = limit.clone();
        set.spawn(async move {
            let _permit = tasks::acquire(&limit).await?;
            merger.merge_edges(&key.src, &key.tgt, &records).await
        });
    }
    let edges = tasks::collect(set, "merge edges").await.len();

    (nodes, edges)
}

/// Extract and merge `chunks`; returns `(nodes, edges)` merged.
pub async fn build_graph(
    llm: &LlmProvider,
    merger: &Merger,
    chunks: &BTreeMap<String, ChunkRecord>,
    limit: &Arc<Semaphore>,
) -> (usize, usize) {
    if chunks.is_empty() {
        warn!("no new chunks to extract");
        return (0, 0);
    }
    let extraction = extract_chunks(llm, chunks, limit).await;
    info!(
        chunks = chunks.len(),
        entities = extraction.entities.len(),
        relations = extraction.relations.len(),
        "extraction complete"
    );
    merge_extraction(merger, extraction, limit).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::dummy::DummyProvider;
    use crate::storage::GraphStore;
    use crate::tokenizer::WordPieceTokenizer;
    use tempfile::TempDir;

    fn extractor(prompt: &str) -> Option<String> {
        prompt.starts_with("-Goal-").then(|| {
            concat!(
                r#"("entity"<|>Ice<|>substance<|>Frozen water.)##"#,
                r#"("entity"<|>Water<|>substance<|>A clear liquid.)##"#,
                r#"("relationship"<|>Ice<|>Water<|>Ice melts into water.<|>9)##"#,
                r#"("relationship"<|>Ice<|>Cold<|>Ice is cold.<|>5)<|COMPLETE|>"#,
            )
            .to_string()
        })
    }

    fn chunk(content: &str) -> ChunkRecord {
        ChunkRecord { content: content.into(), full_doc_id: "doc-1".into(), chunk_order_index: 0, tokens: 3 }
    }

    #[tokio::test]
    async fn chunks_become_nodes_and_edges() {
        let dir = TempDir::new().unwrap();
        let graph = Arc::new(GraphStore::open(dir.path()).unwrap());
        let llm = LlmProvider::Dummy(DummyProvider::with_responder(extractor));
        let merger = Merger::new(graph.clone(), llm.clone(), Arc::new(WordPieceTokenizer), 200);
        let limit = Arc::new(Semaphore::new(4));
        let chunks = BTreeMap::from([("chunk-a".to_string(), chunk("ice and water"))]);

        let (nodes, edges) = build_graph(&llm, &merger, &chunks, &limit).await;
        assert_eq!((nodes, edges), (2, 2));
        assert!(graph.has_node("ICE").unwrap());
        // endpoint never extracted as an entity
        let cold = graph.get_node("COLD").unwrap().unwrap();
        assert_eq!(cold.entity_type, "UNKNOWN");
        assert!(graph.has_edge("WATER", "ICE").unwrap());
    }

    #[tokio::test]
    async fn repeated_records_merge_into_one_node() {
        let dir = TempDir::new().unwrap();
        let graph = Arc::new(GraphStore::open(dir.path()).unwrap());
        let llm = LlmProvider::Dummy(DummyProvider::with_responder(extractor));
        let merger = Merger::new(graph.clone(), llm.clone(), Arc::new(WordPieceTokenizer), 200);
        let limit = Arc::new(Semaphore::new(2));
        let chunks = BTreeMap::from([
            ("chunk-a".to_string(), chunk("first")),
            ("chunk-b".to_string(), chunk("second")),
        ]);

        build_graph(&llm, &merger, &chunks, &limit).await;
        let ice = graph.get_node("ICE").unwrap().unwrap();
        assert_eq!(ice.source_ids.len(), 2);
        assert_eq!(ice.description, "Frozen water.");
    }

    #[tokio::test]
    async fn concurrent_relations_fold_into_one_placeholder() {
        fn cold_relations(prompt: &str) -> Option<String> {
            prompt.starts_with("-Goal-").then(|| {
                concat!(
                    r#"("relationship"<|>Ice<|>Cold<|>Ice is cold.<|>5)##"#,
                    r#"("relationship"<|>Snow<|>Cold<|>Snow is cold.<|>5)##"#,
                    r#"("relationship"<|>Wind<|>Cold<|>Wind feels cold.<|>5)<|COMPLETE|>"#,
                )
                .to_string()
            })
        }
        let dir = TempDir::new().unwrap();
        let graph = Arc::new(GraphStore::open(dir.path()).unwrap());
        let llm = LlmProvider::Dummy(DummyProvider::with_responder(cold_relations));
        let merger = Merger::new(graph.clone(), llm.clone(), Arc::new(WordPieceTokenizer), 200);
        let limit = Arc::new(Semaphore::new(4));
        let chunks = BTreeMap::from([("chunk-a".to_string(), chunk("cold things"))]);

        assert_eq!(build_graph(&llm, &merger, &chunks, &limit).await, (0, 3));
        let cold = graph.get_node("COLD").unwrap().unwrap();
        assert_eq!(cold.description, "Ice is cold.<SEP>Snow is cold.<SEP>Wind feels cold.");
    }

    #[tokio::test]
    async fn unparseable_output_extracts_nothing() {
        let dir = TempDir::new().unwrap();
        let graph = Arc::new(GraphStore::open(dir.path()).unwrap());
        let llm = LlmProvider::Dummy(DummyProvider::with_responder(|_| Some("I found nothing.".into())));
        let merger = Merger::new(graph.clone(), llm.clone(), Arc::new(WordPieceTokenizer), 200);
        let limit = Arc::new(Semaphore::new(2));
        let chunks = BTreeMap::from([("chunk-a".to_string(), chunk("text"))]);

        assert_eq!(build_graph(&llm, &merger, &chunks, &limit).await, (0, 0));
        assert_eq!(graph.node_count().unwrap(), 0);
    }
}

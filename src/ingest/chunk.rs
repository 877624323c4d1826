//! Document hashing, dedup and token-budgeted chunking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ChunkingConfig;
use crate::error::AppError;
use crate::storage::{JsonKvStore, compute_content_hash};
use crate::tokenizer::{Tokenizer, chunk_by_token_size};

/// Stored under `doc-<hash>` in `full_docs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub content: String,
}

/// Stored under `chunk-<hash>` in `text_chunks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub content: String,
    pub full_doc_id: String,
    pub chunk_order_index: usize,
    pub tokens: usize,
}

/// One piece of input text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputText {
    pub content: String,
}

/// Input accepted by the pipeline: raw documents, or documents already split
/// into chunks by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputData {
    Raw(Vec<InputText>),
    Chunked(Vec<Vec<InputText>>),
}

/// Hash, dedup and chunk `data`; store new documents and chunks and return
/// the chunks that were not stored before.
pub fn split_chunks(
    data: &InputData,
    full_docs: &JsonKvStore<DocumentRecord>,
    text_chunks: &JsonKvStore<ChunkRecord>,
    tokenizer: &dyn Tokenizer,
    chunking: &ChunkingConfig,
) -> Result<BTreeMap<String, ChunkRecord>, AppError> {
    let (docs, chunks) = match data {
        InputData::Raw(docs) => chunk_raw(docs, tokenizer, chunking)?,
        InputData::Chunked(docs) => chunk_prechunked(docs, tokenizer),
    };
    if docs.is_empty() {
        return Ok(BTreeMap::new());
    }

    let new_doc_keys = full_docs.filter_keys(docs.keys())?;
    if new_doc_keys.is_empty() {
        warn!("all documents are already stored");
        return Ok(BTreeMap::new());
    }
    info!(documents = new_doc_keys.len(), "inserting new documents");

    let new_chunk_keys = text_chunks.filter_keys(chunks.keys())?;
    let new_chunks: BTreeMap<String, ChunkRecord> = chunks
        .into_iter()
        .filter(|(k, c)| new_chunk_keys.contains(k) && new_doc_keys.contains(&c.full_doc_id))
        .collect();
    let new_docs: BTreeMap<String, DocumentRecord> =
        docs.into_iter().filter(|(k, _)| new_doc_keys.contains(k)).collect();

    full_docs.upsert(new_docs)?;
    text_chunks.upsert(new_chunks.clone())?;
    Ok(new_chunks)
}

type Split = (BTreeMap<String, DocumentRecord>, BTreeMap<String, ChunkRecord>);

fn chunk_raw(docs: &[InputText], tokenizer: &dyn Tokenizer, chunking: &ChunkingConfig) -> Result<Split, AppError> {
    let mut doc_map = BTreeMap::new();
    let mut chunk_map = BTreeMap::new();
    for doc in docs {
        let doc_key = compute_content_hash(&doc.content, "doc-");
        for piece in chunk_by_token_size(tokenizer, &doc.content, chunking.chunk_overlap, chunking.chunk_size)? {
            chunk_map.insert(
                compute_content_hash(&piece.content, "chunk-"),
                ChunkRecord {
                    content: piece.content,
                    full_doc_id: doc_key.clone(),
                    chunk_order_index: piece.chunk_order_index,
                    tokens: piece.tokens,
                },
            );
        }
        doc_map.insert(doc_key, DocumentRecord { content: doc.content.clone() });
    }
    Ok((doc_map, chunk_map))
}

/// Caller-chunked input: a document is the concatenation of its chunks.
fn chunk_prechunked(docs: &[Vec<InputText>], tokenizer: &dyn Tokenizer) -> Split {
    let mut doc_map = BTreeMap::new();
    let mut chunk_map = BTreeMap::new();
    for doc in docs {
        let content: String = doc.iter().map(|c| c.content.as_str()).collect();
        let doc_key = compute_content_hash(&content, "doc-");
        for (index, chunk) in doc.iter().enumerate() {
            chunk_map.insert(
                compute_content_hash(&chunk.content, "chunk-"),
                ChunkRecord {
                    content: chunk.content.clone(),
                    full_doc_id: doc_key.clone(),
                    chunk_order_index: index,
                    tokens: tokenizer.count(&chunk.content),
                },
            );
        }
        doc_map.insert(doc_key, DocumentRecord { content });
    }
    (doc_map, chunk_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::WordPieceTokenizer;
    use tempfile::TempDir;

    struct Stores {
        _dir: TempDir,
        docs: JsonKvStore<DocumentRecord>,
        chunks: JsonKvStore<ChunkRecord>,
    }

    fn make_stores() -> Stores {
        let dir = TempDir::new().unwrap();
        let docs = JsonKvStore::open(dir.path(), "full_docs").unwrap();
        let chunks = JsonKvStore::open(dir.path(), "text_chunks").unwrap();
        Stores { _dir: dir, docs, chunks }
    }

    fn raw(texts: &[&str]) -> InputData {
        InputData::Raw(texts.iter().map(|t| InputText { content: t.to_string() }).collect())
    }

    #[test]
    fn new_documents_are_chunked_and_stored() {
        let s = make_stores();
        let cfg = ChunkingConfig { chunk_size: 4, chunk_overlap: 0 };
        let out = split_chunks(&raw(&["one two three four five six"]), &s.docs, &s.chunks, &WordPieceTokenizer, &cfg)
            .unwrap();
        assert_eq!(out.len(), 2);
        let mut ordered: Vec<_> = out.values().collect();
        ordered.sort_by_key(|c| c.chunk_order_index);
        assert_eq!(ordered[0].content, "one two three four");
        assert_eq!(ordered[1].content, "five six");
        assert_eq!(ordered[1].tokens, 2);
        assert!(out.keys().all(|k| k.starts_with("chunk-")));
        assert!(out.values().all(|c| c.full_doc_id.starts_with("doc-")));
        assert_eq!(s.docs.len().unwrap(), 1);
        assert_eq!(s.chunks.len().unwrap(), 2);
    }

    #[test]
    fn reinserting_is_a_noop() {
        let s = make_stores();
        let cfg = ChunkingConfig { chunk_size: 16, chunk_overlap: 2 };
        let data = raw(&["Water boils at one hundred degrees."]);
        assert_eq!(split_chunks(&data, &s.docs, &s.chunks, &WordPieceTokenizer, &cfg).unwrap().len(), 1);
        assert!(split_chunks(&data, &s.docs, &s.chunks, &WordPieceTokenizer, &cfg).unwrap().is_empty());
    }

    #[test]
    fn prechunked_input_keeps_chunks() {
        let s = make_stores();
        let data: InputData = serde_json::from_str(r#"[[{"content":"Alpha. "},{"content":"Beta."}]]"#).unwrap();
        assert!(matches!(data, InputData::Chunked(_)));
        let cfg = ChunkingConfig { chunk_size: 16, chunk_overlap: 2 };
        let out = split_chunks(&data, &s.docs, &s.chunks, &WordPieceTokenizer, &cfg).unwrap();
        assert_eq!(out.len(), 2);
        let doc = s.docs.all().unwrap().into_values().next().unwrap();
        assert_eq!(doc.content, "Alpha. Beta.");
    }

    #[test]
    fn raw_input_parses_from_json() {
        let data: InputData = serde_json::from_str(r#"[{"content":"x"}]"#).unwrap();
        assert_eq!(data, raw(&["x"]));
    }
}

// Library root: the pipeline, its stages and the batching engine.
// The binary entry point is src/main.rs.

pub mod config;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod judge;
pub mod llm;
pub mod logger;
pub mod pipeline;
pub mod prompts;
pub mod render;
pub mod storage;
pub mod tasks;
pub mod tokenizer;
pub mod traverse;

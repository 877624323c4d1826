//! GraphGen: the pipeline that owns the stores and models and runs the stages.
//!
//! Stages run in order `insert → quiz → judge → traverse`, each ending with a
//! flush of whatever it touched. Every stage can also be called on its own
//! against an existing working directory.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::graph::merge::Merger;
use crate::ingest::{self, ChunkRecord, DocumentRecord, InputData};
use crate::judge::{self, Judge, RephraseCache};
use crate::llm::LlmProvider;
use crate::render::{self, QaRecord};
use crate::storage::{GraphStore, JsonKvStore};
use crate::tokenizer::Tokenizer;
use crate::traverse;

/// Namespaces of the content stores under the working directory.
pub const FULL_DOCS: &str = "full_docs";
pub const TEXT_CHUNKS: &str = "text_chunks";
pub const REPHRASE: &str = "rephrase";
pub const QA: &str = "qa";

pub struct GraphGen {
    config: Config,
    teacher: LlmProvider,
    student: LlmProvider,
    tokenizer: Arc<dyn Tokenizer>,
    full_docs: JsonKvStore<DocumentRecord>,
    text_chunks: JsonKvStore<ChunkRecord>,
    rephrase: Arc<RephraseCache>,
    qa: JsonKvStore<QaRecord>,
    graph: Arc<GraphStore>,
    limit: Arc<Semaphore>,
}

impl GraphGen {
    /// Open (or create) every store under `config.working_dir`.
    pub fn new(
        config: Config,
        teacher: LlmProvider,
        student: LlmProvider,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Result<Self, AppError> {
        let dir = config.working_dir.clone();
        info!(working_dir = %dir.display(), max_concurrent = config.max_concurrent, "opening graphgen stores");
        Ok(Self {
            full_docs: JsonKvStore::open(&dir, FULL_DOCS)?,
            text_chunks: JsonKvStore::open(&dir, TEXT_CHUNKS)?,
            rephrase: Arc::new(JsonKvStore::open(&dir, REPHRASE)?),
            qa: JsonKvStore::open(&dir, QA)?,
            graph: Arc::new(GraphStore::open(&dir)?),
            limit: Arc::new(Semaphore::new(config.max_concurrent)),
            config,
            teacher,
            student,
            tokenizer,
        })
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn qa(&self) -> &JsonKvStore<QaRecord> {
        &self.qa
    }

    /// Chunk new documents, extract and merge them into the graph.
    /// Returns `(nodes, edges)` merged.
    pub async fn insert(&self, data: &InputData) -> Result<(usize, usize), AppError> {
        let chunks = ingest::split_chunks(
            data,
            &self.full_docs,
            &self.text_chunks,
            self.tokenizer.as_ref(),
            &self.config.chunking,
        )?;
        let merger = Merger::new(
            self.graph.clone(),
            self.teacher.clone(),
            self.tokenizer.clone(),
            self.config.max_summary_tokens,
        );
        let merged = ingest::build_graph(&self.teacher, &merger, &chunks, &self.limit).await;

        self.full_docs.flush()?;
        self.text_chunks.flush()?;
        self.graph.flush()?;
        info!(chunks = chunks.len(), nodes = merged.0, edges = merged.1, "insert complete");
        Ok(merged)
    }

    fn judge_handle(&self) -> Judge {
        Judge::new(
            self.teacher.clone(),
            self.student.clone(),
            self.rephrase.clone(),
            self.config.quiz_samples,
        )
    }

    /// Fill the rephrase cache for every edge description.
    pub async fn quiz(&self) -> Result<usize, AppError> {
        judge::quiz_relations(&self.judge_handle(), &self.graph, &self.limit).await
    }

    /// Annotate edges with the student's comprehension loss.
    pub async fn judge(&self) -> Result<usize, AppError> {
        judge::judge_relations(&self.judge_handle(), &self.graph, self.config.re_judge, &self.limit).await
    }

    /// Fill `token_length` on nodes and edges that lack it.
    /// Returns the number of records updated.
    pub fn pretokenize(&self) -> Result<usize, AppError> {
        let mut updated = 0usize;
        for mut node in self.graph.get_all_nodes()? {
            if node.token_length.is_none() {
                node.token_length = Some(self.tokenizer.count(&node.description));
                self.graph.upsert_node(node)?;
                updated += 1;
            }
        }
        for mut edge in self.graph.get_all_edges()? {
            if edge.token_length.is_none() {
                edge.token_length = Some(self.tokenizer.count(&edge.description));
                self.graph.upsert_edge(edge)?;
                updated += 1;
            }
        }
        self.graph.flush()?;
        info!(updated, "pre-tokenization complete");
        Ok(updated)
    }

    /// Batch the graph, label batches by difficulty, render and store QA pairs.
    /// Returns the QA records produced by this run.
    pub async fn traverse(&self) -> Result<BTreeMap<String, QaRecord>, AppError> {
        let strategy = &self.config.traverse_strategy;
        strategy.validate()?;
        self.pretokenize()?;

        let nodes = self.graph.get_all_nodes()?;
        let edges = self.graph.get_all_edges()?;
        let mut batches = traverse::get_batches(&nodes, &edges, strategy);
        traverse::assign_difficulty(&mut batches, &strategy.difficulty_order);

        let records = render::render_batches(&self.teacher, batches, &self.limit).await;
        self.qa.upsert(records.clone())?;
        self.qa.flush()?;
        info!(qa = records.len(), "traverse complete");
        Ok(records)
    }

    /// Run every stage over `data`.
    pub async fn run(&self, data: &InputData) -> Result<BTreeMap<String, QaRecord>, AppError> {
        self.insert(data).await?;
        self.quiz().await?;
        self.judge().await?;
        self.traverse().await
    }
}

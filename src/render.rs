//! QA rendering: one question/answer pair per batch.
//!
//! The teacher model first turns the batch's entities and relationships into
//! a passage (the answer), then writes a question for that answer.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::error::AppError;
use crate::llm::{GenerateParams, LlmProvider};
use crate::prompts;
use crate::storage::compute_content_hash;
use crate::tasks;
use crate::traverse::Batch;

/// One synthesized training example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    pub question: String,
    pub answer: String,
    pub loss: f64,
    pub difficulty: String,
}

/// Numbered entity and relationship listings for the answer prompt.
pub fn describe_batch(batch: &Batch) -> (String, String) {
    let entities = batch
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| format!("{}. {}: {}", i + 1, n.id, n.description))
        .collect::<Vec<_>>()
        .join("\n");
    let relationships = batch
        .edges
        .iter()
        .enumerate()
        .map(|(i, e)| format!("{}. {} -> {}: {}", i + 1, e.src_id, e.tgt_id, e.description))
        .collect::<Vec<_>>()
        .join("\n");
    (entities, relationships)
}

async fn render_batch(llm: &LlmProvider, batch: &Batch) -> Result<(String, QaRecord), AppError> {
    let (entities, relationships) = describe_batch(batch);
    let prompt = prompts::render(
        prompts::ANSWER_REPHRASING,
        &[("entities", &entities), ("relationships", &relationships)],
    );
    let answer = llm.generate_answer(&prompt, &GenerateParams::default()).await?;
    let answer = answer.trim().to_string();

    let prompt = prompts::render(prompts::QUESTION_GENERATION, &[("answer", &answer)]);
    let question = llm.generate_answer(&prompt, &GenerateParams::default()).await?;
    let question = question.trim().to_string();
    if question.is_empty() || answer.is_empty() {
        return Err(AppError::Task("empty question or answer".into()));
    }

    let key = compute_content_hash(&answer, "");
    debug!(qa = %key, nodes = batch.nodes.len(), edges = batch.edges.len(), "batch rendered");
    Ok((
        key,
        QaRecord {
            question,
            answer,
            loss: batch.loss,
            difficulty: batch.difficulty.clone().unwrap_or_default(),
        },
    ))
}

/// Render every batch concurrently; failed batches are logged and skipped.
/// Keys are the content hash of the answer.
pub async fn render_batches(
    llm: &LlmProvider,
    batches: Vec<Batch>,
    limit: &Arc<Semaphore>,
) -> BTreeMap<String, QaRecord> {
    let total = batches.len();
    let mut set = JoinSet::new();
    for batch in batches {
        let llm = llm.clone();
        let limit = limit.clone();
        set.spawn(async move {
            let _permit = tasks::acquire(&limit).await?;
            render_batch(&llm, &batch).await
        });
    }
    let out: BTreeMap<String, QaRecord> = tasks::collect(set, "render").await.into_iter().collect();
    info!(batches = total, rendered = out.len(), "rendering complete");
    out
}

//! Quiz and judge stages: annotate every edge with a comprehension loss.
//!
//! `quiz_relations` fills the rephrase cache with statement variants per edge
//! description. `judge_relations` asks the student to verify each variant and
//! stores the mean cross-entropy as the edge's `loss`. Both stages fan out one
//! task per edge under the shared concurrency limit.

pub mod loss;
pub mod quiz;

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::AppError;
use crate::graph::{Edge, EdgeKey};
use crate::llm::LlmProvider;
use crate::prompts;
use crate::storage::{GraphStore, JsonKvStore};
use crate::tasks;

pub use loss::{FALLBACK_LOSS, Label};
pub use quiz::Variant;

/// Description text → its statement variants.
pub type RephraseCache = JsonKvStore<Vec<Variant>>;

/// Scores edges with the student model, sampling variants with the teacher.
#[derive(Clone)]
pub struct Judge {
    teacher: LlmProvider,
    student: LlmProvider,
    rephrase: Arc<RephraseCache>,
    max_samples: usize,
}

impl Judge {
    pub fn new(teacher: LlmProvider, student: LlmProvider, rephrase: Arc<RephraseCache>, max_samples: usize) -> Self {
        Self { teacher, student, rephrase, max_samples }
    }

    /// Cached variants for `description`, sampling and caching them on a miss.
    /// A failed sample falls back to the original statement alone.
    pub async fn variants(&self, description: &str) -> Result<Vec<Variant>, AppError> {
        if let Some(cached) = self.rephrase.get_by_id(description)? {
            if !cached.is_empty() {
                return Ok(cached);
            }
        }
        let variants = match quiz::generate_variants(&self.teacher, description, self.max_samples).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "quiz failed, using the original statement only");
                vec![(description.to_string(), Label::Yes)]
            }
        };
        self.rephrase.upsert(BTreeMap::from([(description.to_string(), variants.clone())]))?;
        Ok(variants)
    }

    /// Comprehension loss of `edge`; [`FALLBACK_LOSS`] if it cannot be scored.
    pub async fn judge(&self, edge: &Edge) -> f64 {
        match self.score(edge).await {
            Ok(loss) => loss,
            Err(e) => {
                warn!(edge = %edge.key(), error = %e, fallback = FALLBACK_LOSS, "judge failed, using fallback loss");
                FALLBACK_LOSS
            }
        }
    }

    async fn score(&self, edge: &Edge) -> Result<f64, AppError> {
        let variants = self.variants(&edge.description).await?;
        let mut judgements = Vec::with_capacity(variants.len());
        for (text, label) in variants {
            let prompt = prompts::render(prompts::STATEMENT_JUDGEMENT, &[("statement", &text)]);
            let tokens = self.student.generate_topk_per_token(&prompt).await?;
            let first = tokens
                .into_iter()
                .next()
                .ok_or_else(|| AppError::Task("student returned no tokens".into()))?;
            judgements.push((first.top_candidates, label));
        }
        loss::yes_no_loss(&judgements)
            .ok_or_else(|| AppError::Task("student gave no yes/no candidate".into()))
    }
}

/// Sample variants for every edge whose description is not cached yet.
/// Returns the number of edges processed.
pub async fn quiz_relations(judge: &Judge, graph: &GraphStore, limit: &Arc<Semaphore>) -> Result<usize, AppError> {
    let edges = graph.get_all_edges()?;
    let mut set: JoinSet<Result<(), AppError>> = JoinSet::new();
    for edge in edges {
        let judge = judge.clone();
        let limit = limit.clone();
        set.spawn(async move {
            let _permit = tasks::acquire(&limit).await?;
            judge.variants(&edge.description).await.map(|_| ())
        });
    }
    let done = tasks::collect(set, "quiz").await.len();
    judge.rephrase.flush()?;
    info!(edges = done, "quiz complete");
    Ok(done)
}

/// Judge every edge (or only unjudged ones unless `re_judge`) and store its loss.
/// Returns the number of edges judged.
pub async fn judge_relations(
    judge: &Judge,
    graph: &Arc<GraphStore>,
    re_judge: bool,
    limit: &Arc<Semaphore>,
) -> Result<usize, AppError> {
    let edges = graph.get_all_edges()?;
    let mut set: JoinSet<Result<(EdgeKey, f64), AppError>> = JoinSet::new();
    let mut skipped = 0usize;
    for edge in edges {
        if !re_judge && edge.loss.is_some() {
            skipped += 1;
            continue;
        }
        let judge = judge.clone();
        let limit = limit.clone();
        let graph = graph.clone();
        set.spawn(async move {
            let _permit = tasks::acquire(&limit).await?;
            let loss = judge.judge(&edge).await;
            let key = edge.key();
            graph.update_edge_loss(&key, loss)?;
            Ok((key, loss))
        });
    }
    let judged = tasks::collect(set, "judge").await;
    graph.flush()?;
    judge.rephrase.flush()?;
    info!(judged = judged.len(), skipped, "judge complete");
    Ok(judged.len())
}

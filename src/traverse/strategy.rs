//! Traversal strategy: the immutable per-run knobs of the batching engine.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Which budget bounds a batch's expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpandMethod {
    /// Budget is a count of extra edges (`max_extra_edges`).
    MaxWidth,
    /// Budget is a token count (`max_tokens`) covering edges and the nodes they introduce.
    MaxTokens,
}

/// Ordering of the global edge list and of candidates competing within a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSampling {
    MaxLoss,
    MinLoss,
    Random,
}

/// What to do with nodes that no batch touched (degree zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolatedNodeStrategy {
    /// Emit one singleton batch per isolated node.
    Add,
    /// Drop isolated nodes silently.
    Ignore,
}

impl std::fmt::Display for ExpandMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExpandMethod::MaxWidth => "max_width",
            ExpandMethod::MaxTokens => "max_tokens",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for EdgeSampling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EdgeSampling::MaxLoss => "max_loss",
            EdgeSampling::MinLoss => "min_loss",
            EdgeSampling::Random => "random",
        };
        write!(f, "{s}")
    }
}

/// Strategy driving [`get_batches`](super::get_batches).
///
/// Defaults: width-budgeted with five extra edges, one direction and one
/// level deep, hardest edges first, isolated nodes kept. Difficulty
/// stratification stays off until three distinct labels are configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraverseStrategy {
    pub expand_method: ExpandMethod,
    pub bidirectional: bool,
    /// Edge budget per batch, excluding the seed edge (`max_width` only).
    pub max_extra_edges: usize,
    /// Token budget per batch, including the seed edge and its endpoints (`max_tokens` only).
    pub max_tokens: usize,
    pub max_depth: usize,
    pub edge_sampling: EdgeSampling,
    pub isolated_node_strategy: IsolatedNodeStrategy,
    /// Labels for the low / mid / high loss terciles, in that order.
    pub difficulty_order: Vec<String>,
    /// Shuffle seed for `EdgeSampling::Random`; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for TraverseStrategy {
    fn default() -> Self {
        Self {
            expand_method: ExpandMethod::MaxWidth,
            bidirectional: false,
            max_extra_edges: 5,
            max_tokens: 1024,
            max_depth: 1,
            edge_sampling: EdgeSampling::MaxLoss,
            isolated_node_strategy: IsolatedNodeStrategy::Add,
            difficulty_order: vec!["medium".into(), "medium".into(), "medium".into()],
            seed: None,
        }
    }
}

impl TraverseStrategy {
    /// Reject structurally inconsistent strategies before any work starts.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.difficulty_order.len() != 3 {
            return Err(AppError::Strategy(format!(
                "difficulty_order must hold exactly 3 labels, got {}",
                self.difficulty_order.len()
            )));
        }
        if self.difficulty_order.iter().any(|l| l.trim().is_empty()) {
            return Err(AppError::Strategy("difficulty_order labels must not be empty".into()));
        }
        Ok(())
    }
}

//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Two roles share this type: the *teacher* (extraction, summaries,
//! paraphrases, QA rendering) and the *student* (yes/no judgements scored by
//! per-token probabilities). Provider instances are immutable; clone freely.

pub mod providers;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider request failed: {0}")]
    Request(String),
    /// Rate limit, timeout, connection reset or 5xx. Retried by the provider.
    #[error("transient provider failure: {0}")]
    Transient(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

// ── Call types ────────────────────────────────────────────────────────────────

/// One chat turn passed as prior history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

/// Per-call knobs for [`LlmProvider::generate_answer`].
#[derive(Debug, Clone, Default)]
pub struct GenerateParams {
    /// Prior turns, oldest first, placed before the prompt.
    pub history: Vec<Message>,
    /// Overrides the provider's configured temperature.
    pub temperature: Option<f32>,
}

impl GenerateParams {
    pub fn with_temperature(temperature: f32) -> Self {
        Self { history: Vec::new(), temperature: Some(temperature) }
    }
}

/// A generated token with its probability and the alternatives the model
/// considered at that position (most likely first).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub prob: f64,
    pub top_candidates: Vec<Token>,
}

impl Token {
    pub fn new(text: impl Into<String>, prob: f64) -> Self {
        Self { text: text.into(), prob, top_candidates: Vec::new() }
    }
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new match arms.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl LlmProvider {
    /// Send `prompt` (after `params.history`) and return the reply text.
    pub async fn generate_answer(
        &self,
        prompt: &str,
        params: &GenerateParams,
    ) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.generate_answer(prompt, params).await,
            LlmProvider::OpenAiCompatible(p) => p.generate_answer(prompt, params).await,
        }
    }

    /// Generate a reply and return every token with its top alternatives.
    pub async fn generate_topk_per_token(&self, prompt: &str) -> Result<Vec<Token>, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.generate_topk_per_token(prompt).await,
            LlmProvider::OpenAiCompatible(p) => p.generate_topk_per_token(prompt).await,
        }
    }
}

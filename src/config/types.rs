//! Public configuration structs consumed by the pipeline stages.

use std::path::PathBuf;

use crate::traverse::TraverseStrategy;

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.<role>.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Default sampling temperature (per-call overrides win).
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Number of alternatives requested per generated token (`top_logprobs`).
    pub top_logprobs: u8,
    /// Attempts per call before a transient failure is surfaced.
    pub max_attempts: u32,
}

/// Configuration for one LLM role (teacher or student).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"` or `"openai"`).
    /// Maps to `default` in `[llm.<role>]`.
    pub provider: String,
    pub openai: OpenAiConfig,
}

/// Token-window chunking of raw documents.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// Fully-resolved pipeline configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding every persisted namespace (already expanded, no `~`).
    pub working_dir: PathBuf,
    pub log_level: String,
    /// Optional JSON document list ingested by the binary.
    pub input_file: Option<PathBuf>,
    /// Upper bound on simultaneous in-flight external calls.
    pub max_concurrent: usize,
    pub chunking: ChunkingConfig,
    /// Token threshold above which merged descriptions are summarised.
    pub max_summary_tokens: usize,
    /// Paraphrase samples per edge (and as many negations).
    pub quiz_samples: usize,
    /// Re-judge edges that already carry a loss.
    pub re_judge: bool,
    pub traverse_strategy: TraverseStrategy,
    /// Teacher model: extraction, summaries, paraphrases, QA rendering.
    pub teacher: LlmConfig,
    /// Student model: yes/no judgements that produce comprehension loss.
    pub student: LlmConfig,
    /// From `TEACHER_API_KEY`; never sourced from TOML.
    pub teacher_api_key: Option<String>,
    /// From `STUDENT_API_KEY`; never sourced from TOML.
    pub student_api_key: Option<String>,
}

//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use serde::Deserialize;

use crate::traverse::TraverseStrategy;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape: serde target before resolution.
#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub pipeline: RawPipeline,
    #[serde(default)]
    pub chunking: RawChunking,
    #[serde(default)]
    pub merge: RawMerge,
    #[serde(default)]
    pub quiz: RawQuiz,
    #[serde(default)]
    pub judge: RawJudge,
    #[serde(default)]
    pub traverse_strategy: TraverseStrategy,
    #[serde(default)]
    pub llm: RawLlmRoles,
}

#[derive(Deserialize)]
pub(super) struct RawPipeline {
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub input_file: Option<String>,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for RawPipeline {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            log_level: default_log_level(),
            input_file: None,
            max_concurrent: default_max_concurrent(),
        }
    }
}

// ── Stages ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawChunking {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for RawChunking {
    fn default() -> Self {
        Self { chunk_size: default_chunk_size(), chunk_overlap: default_chunk_overlap() }
    }
}

#[derive(Deserialize)]
pub(super) struct RawMerge {
    #[serde(default = "default_max_summary_tokens")]
    pub max_summary_tokens: usize,
}

impl Default for RawMerge {
    fn default() -> Self {
        Self { max_summary_tokens: default_max_summary_tokens() }
    }
}

#[derive(Deserialize)]
pub(super) struct RawQuiz {
    #[serde(default = "default_quiz_samples")]
    pub max_samples: usize,
}

impl Default for RawQuiz {
    fn default() -> Self {
        Self { max_samples: default_quiz_samples() }
    }
}

#[derive(Deserialize, Default)]
pub(super) struct RawJudge {
    #[serde(default)]
    pub re_judge: bool,
}

// ── LLM ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub(super) struct RawLlmRoles {
    #[serde(default)]
    pub teacher: RawLlm,
    #[serde(default)]
    pub student: RawLlm,
}

#[derive(Deserialize)]
pub(super) struct RawLlm {
    /// Maps to `default = "..."` in `[llm.<role>]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
pub(super) struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_temperature")]
    pub temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_top_logprobs")]
    pub top_logprobs: u8,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
            top_logprobs: default_top_logprobs(),
            max_attempts: default_max_attempts(),
        }
    }
}

// ── Defaults ────────────────────────────────────────────────────────────────

fn default_working_dir() -> String { "~/.graphgen".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_max_concurrent() -> usize { 1000 }
fn default_chunk_size() -> usize { 1024 }
fn default_chunk_overlap() -> usize { 100 }
fn default_max_summary_tokens() -> usize { 200 }
fn default_quiz_samples() -> usize { 2 }
fn default_llm_provider() -> String { "dummy".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_temperature() -> f32 { 0.0 }
fn default_openai_timeout_seconds() -> u64 { 60 }
fn default_top_logprobs() -> u8 { 5 }
fn default_max_attempts() -> u32 { 3 }

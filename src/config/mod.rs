//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `GRAPHGEN_WORK_DIR` and `GRAPHGEN_LOG_LEVEL` env overrides.
//! API keys come only from `TEACHER_API_KEY` / `STUDENT_API_KEY`.
//!
//! # Module layout
//!
//! - **types**: Public configuration structs consumed by the pipeline
//!   (`Config`, `LlmConfig`, `ChunkingConfig`, …).
//! - **raw**: Raw TOML deserialization types (`RawConfig`, `RawLlm`, …).
//!   These mirror the file shape and use serde defaults; kept private.
//! - **load**: Loading logic: `merge_toml`, `load_raw_merged`, `load`,
//!   `load_from`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{expand_home, load, load_from};
pub use types::*;

use crate::traverse::TraverseStrategy;

impl Config {
    /// Safe `Config` for tests: dummy providers, no API keys, no network.
    pub fn test_default(working_dir: &std::path::Path) -> Self {
        let llm = LlmConfig {
            provider: "dummy".into(),
            openai: OpenAiConfig {
                api_base_url: "http://localhost:0/v1/chat/completions".into(),
                model: "test-model".into(),
                temperature: 0.0,
                timeout_seconds: 1,
                top_logprobs: 5,
                max_attempts: 1,
            },
        };
        Self {
            working_dir: working_dir.to_path_buf(),
            log_level: "info".into(),
            input_file: None,
            max_concurrent: 8,
            chunking: ChunkingConfig { chunk_size: 1024, chunk_overlap: 100 },
            max_summary_tokens: 200,
            quiz_samples: 2,
            re_judge: false,
            traverse_strategy: TraverseStrategy::default(),
            teacher: llm.clone(),
            student: llm,
            teacher_api_key: None,
            student_api_key: None,
        }
    }
}

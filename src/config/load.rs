//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, supports `[meta] base = "..."` inheritance chains,
//! and applies `GRAPHGEN_WORK_DIR` and `GRAPHGEN_LOG_LEVEL` env overrides.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;

use super::raw::{RawConfig, RawLlm};
use super::types::*;

/// Deep-merge two TOML values.
/// Tables merge recursively; any other overlay value replaces the base value.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow its `[meta] base` chain, return the merged value.
/// `visited` holds canonical paths already seen so cycles fail fast.
fn load_raw_merged(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    match overlay_val.get("meta").and_then(|m| m.get("base")).and_then(|b| b.as_str()) {
        Some(base_str) => {
            let base_path = if Path::new(base_str).is_absolute() {
                PathBuf::from(base_str)
            } else {
                path.parent().unwrap_or(Path::new(".")).join(base_str)
            };
            let base_val = load_raw_merged(&base_path, visited)?;
            Ok(merge_toml(base_val, overlay_val))
        }
        None => Ok(overlay_val),
    }
}

/// Load config from the given path, or `config/default.toml`, then apply env-var overrides.
/// Without a path and without `config/default.toml`, every field takes its built-in default.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("GRAPHGEN_WORK_DIR").ok();
    let log_level_override = env::var("GRAPHGEN_LOG_LEVEL").ok();

    if let Some(path) = config_path {
        return load_from(Path::new(path), work_dir_override.as_deref(), log_level_override.as_deref());
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(default_path, work_dir_override.as_deref(), log_level_override.as_deref())
    } else {
        resolve(
            RawConfig::default(),
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        )
    }
}

/// Load an explicit file with explicit overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let merged_val = load_raw_merged(path, &mut HashSet::new())?;

    let parsed: RawConfig = Deserialize::deserialize(merged_val).map_err(|e: toml::de::Error| {
        AppError::Config(format!("config error in {}: {e}", path.display()))
    })?;

    resolve(parsed, work_dir_override, log_level_override)
}

fn resolve(
    parsed: RawConfig,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let p = parsed.pipeline;

    let working_dir = expand_home(work_dir_override.unwrap_or(&p.working_dir));
    let log_level = log_level_override.unwrap_or(&p.log_level).to_string();
    let input_file = p.input_file.map(|f| expand_home(&f));

    crate::logger::parse_level(&log_level)?;
    if p.max_concurrent == 0 {
        return Err(AppError::Config("pipeline.max_concurrent must be at least 1".into()));
    }
    if parsed.chunking.chunk_size == 0 {
        return Err(AppError::Config("chunking.chunk_size must be at least 1".into()));
    }
    if parsed.chunking.chunk_overlap >= parsed.chunking.chunk_size {
        return Err(AppError::Config(format!(
            "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
            parsed.chunking.chunk_overlap, parsed.chunking.chunk_size
        )));
    }
    if parsed.quiz.max_samples == 0 {
        return Err(AppError::Config("quiz.max_samples must be at least 1".into()));
    }
    parsed.traverse_strategy.validate()?;

    Ok(Config {
        working_dir,
        log_level,
        input_file,
        max_concurrent: p.max_concurrent,
        chunking: ChunkingConfig {
            chunk_size: parsed.chunking.chunk_size,
            chunk_overlap: parsed.chunking.chunk_overlap,
        },
        max_summary_tokens: parsed.merge.max_summary_tokens,
        quiz_samples: parsed.quiz.max_samples,
        re_judge: parsed.judge.re_judge,
        traverse_strategy: parsed.traverse_strategy,
        teacher: llm_config(parsed.llm.teacher),
        student: llm_config(parsed.llm.student),
        teacher_api_key: env::var("TEACHER_API_KEY").ok(),
        student_api_key: env::var("STUDENT_API_KEY").ok(),
    })
}

fn llm_config(raw: RawLlm) -> LlmConfig {
    LlmConfig {
        provider: raw.provider,
        openai: OpenAiConfig {
            api_base_url: raw.openai.api_base_url,
            model: raw.openai.model,
            temperature: raw.openai.temperature,
            timeout_seconds: raw.openai.timeout_seconds,
            top_logprobs: raw.openai.top_logprobs,
            max_attempts: raw.openai.max_attempts.max(1),
        },
    }
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

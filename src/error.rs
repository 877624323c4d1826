//! Application-wide error types.

use thiserror::Error;

use crate::llm::ProviderError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("strategy error: {0}")]
    Strategy(String),

    #[error("task error: {0}")]
    Task(String),

    #[error("llm error: {0}")]
    Llm(#[from] ProviderError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

//! Stderr logging for the pipeline stages.
//!
//! `main` resolves one level (`-v` flags, then `GRAPHGEN_LOG_LEVEL`, then
//! `pipeline.log_level`) and calls [`init`] once before any store is opened.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Install the global subscriber, writing to stderr so stdout stays free for
/// the stage summary.
///
/// `level` is a plain level (`"info"`) or a directive list such as
/// `"graphgen=debug,reqwest=warn"`. With `from_cli` set, `level` wins over
/// `RUST_LOG`; otherwise `RUST_LOG` wins when it parses.
pub fn init(level: &str, from_cli: bool) -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(level, from_cli)?)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

fn build_filter(level: &str, from_cli: bool) -> Result<EnvFilter, AppError> {
    if from_cli {
        return EnvFilter::try_new(level).or_else(|level_err| {
            EnvFilter::try_from_default_env().map_err(|env_err| {
                AppError::Logger(format!("invalid log level '{level}': {level_err}; RUST_LOG: {env_err}"))
            })
        });
    }
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))
}

/// Check `pipeline.log_level` at config load. Only the five plain levels are
/// accepted there; directive lists belong in `RUST_LOG`.
pub fn parse_level(level: &str) -> Result<LevelFilter, AppError> {
    if level.trim().is_empty() {
        return Err(AppError::Logger("pipeline.log_level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| AppError::Logger(format!("pipeline.log_level: unrecognised level '{level}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_levels_accepted_in_config() {
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::DEBUG);
        assert_eq!(parse_level("warn").unwrap(), LevelFilter::WARN);
        assert!(parse_level("graphgen=debug").is_err());
        assert!(parse_level(" ").is_err());
    }

    #[test]
    fn cli_directives_build_a_filter() {
        let filter = build_filter("graphgen=trace,reqwest=warn", true).unwrap();
        assert!(filter.to_string().contains("graphgen=trace"));
    }

    #[test]
    fn second_init_reports_subscriber_error() {
        // Another test in this binary may have installed the subscriber first.
        let _ = init("info", true);
        match init("info", true) {
            Err(AppError::Logger(msg)) => assert!(msg.contains("set subscriber")),
            other => panic!("expected a logger error, got {other:?}"),
        }
    }
}

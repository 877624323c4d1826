//! graphgen: pipeline entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Build teacher and student providers
//!   6. Open the working directory
//!   7. Run the requested stages

use std::sync::Arc;

use tracing::info;

use graphgen::config;
use graphgen::error::AppError;
use graphgen::ingest::InputData;
use graphgen::llm::providers;
use graphgen::logger;
use graphgen::pipeline::GraphGen;
use graphgen::tokenizer::WordPieceTokenizer;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Optional file.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();
    let mut config = config::load(args.config_path.as_deref())?;
    if let Some(input) = args.input_path {
        config.input_file = Some(input.into());
    }

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some())?;

    info!(
        working_dir = %config.working_dir.display(),
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        teacher = %config.teacher.provider,
        student = %config.student.provider,
        stage = %args.stage,
        "config loaded"
    );

    let teacher = providers::build(&config.teacher, config.teacher_api_key.clone())?;
    let student = providers::build(&config.student, config.student_api_key.clone())?;
    let input_file = config.input_file.clone();
    let graphgen = GraphGen::new(config, teacher, student, Arc::new(WordPieceTokenizer))?;

    let stage = args.stage.as_str();
    if matches!(stage, "all" | "insert") {
        let path = input_file.ok_or_else(|| AppError::Config("no input file; set pipeline.input_file or pass -i".into()))?;
        let raw = tokio::fs::read_to_string(&path).await?;
        let data: InputData = serde_json::from_str(&raw)
            .map_err(|e| AppError::Config(format!("invalid input file {}: {e}", path.display())))?;
        graphgen.insert(&data).await?;
    }
    if matches!(stage, "all" | "quiz") {
        graphgen.quiz().await?;
    }
    if matches!(stage, "all" | "judge") {
        graphgen.judge().await?;
    }
    if matches!(stage, "all" | "traverse") {
        let records = graphgen.traverse().await?;
        println!("✓ {} QA pairs written", records.len());
    }

    Ok(())
}

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
    input_path: Option<String>,
    stage: String,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;
    let mut input_path = None;
    let mut stage = "all".to_string();

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: graphgen [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -i, --input <PATH>         Input JSON file (overrides pipeline.input_file)");
                println!("  -s, --stage <STAGE>        all | insert | quiz | judge | traverse (default: all)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => config_path = Some(required(&mut iter, "-f/--config")),
            "-i" | "--input" => input_path = Some(required(&mut iter, "-i/--input")),
            "-s" | "--stage" => {
                stage = required(&mut iter, "-s/--stage");
                if !matches!(stage.as_str(), "all" | "insert" | "quiz" | "judge" | "traverse") {
                    eprintln!("error: unknown stage '{stage}'");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, config_path, input_path, stage }
}

fn required(iter: &mut impl Iterator<Item = String>, flag: &str) -> String {
    match iter.next() {
        Some(value) => value,
        None => {
            eprintln!("error: {flag} requires an argument");
            std::process::exit(1);
        }
    }
}

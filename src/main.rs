//! Batch curation entry point.
//!
//! ```text
//! cellcurate <config.json> <input_dir> <output_dir> [intents.json]
//! ```
//!
//! Loads label masks from `input_dir`, commits them into a session, replays
//! the optional edit script and writes the results table, the excluded table
//! and one ROI archive per image to `output_dir`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use thiserror::Error;
use web_time::Instant;

use cellcurate::config::{ConfigError, CurationConfig};
use cellcurate::curation::{Effect, Intent};
use cellcurate::error::CurationError;
use cellcurate::format::{ExportOptions, FormatError, FormatRegistry, WarningSeverity};
use cellcurate::pipeline::{BatchProducer, MaskDirectory, PipelineError};
use cellcurate::session::Session;

/// Output formats written on every run.
const OUTPUT_FORMATS: [&str; 2] = ["csv", "imagej-roi"];

#[derive(Error, Debug)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    #[error("{0}")]
    Curation(#[from] CurationError),

    #[error("{0}")]
    Format(#[from] FormatError),

    #[error("Failed to read intents from {path:?}: {message}")]
    Intents { path: PathBuf, message: String },

    #[error("Unknown output format '{0}'")]
    UnknownFormat(&'static str),
}

/// Curate segmented cells and export the measurement tables and ROI archives
#[derive(Parser, Debug)]
#[command(name = "cellcurate", version, long_about = None)]
struct Args {
    /// Curation configuration (JSON)
    config: PathBuf,

    /// Directory holding `<stem>_labels.npy` or `<stem>_labels.png` masks
    input: PathBuf,

    /// Directory receiving the tables and the ROI folder
    output: PathBuf,

    /// Edit script to replay, a JSON array of intents
    intents: Option<PathBuf>,
}

/// Printed to stdout as JSON when a run completes.
#[derive(Debug, Default, Serialize)]
struct RunSummary {
    images: Vec<String>,
    skipped: Vec<String>,
    cancelled: bool,
    intents_applied: usize,
    intents_rejected: usize,
    records: usize,
    excluded: usize,
    outlines: usize,
    issues: usize,
    files: Vec<PathBuf>,
}

fn load_intents(path: &Path) -> Result<Vec<Intent>, CliError> {
    let intents_error = |message: String| CliError::Intents {
        path: path.to_path_buf(),
        message,
    };
    let json = std::fs::read_to_string(path).map_err(|e| intents_error(e.to_string()))?;
    serde_json::from_str(&json).map_err(|e| intents_error(e.to_string()))
}

fn run(args: &Args, config: &CurationConfig) -> Result<RunSummary, CliError> {
    let start = Instant::now();
    let mut summary = RunSummary::default();

    let masks = MaskDirectory::new(&args.input);
    let images = masks.scan()?;
    let producer = BatchProducer::spawn(images, Arc::new(masks), config)?;

    let mut session = Session::new(config);
    let ingest = session.ingest(&producer);
    drop(producer);
    summary.images = ingest.committed;
    summary.skipped = ingest
        .skipped
        .into_iter()
        .map(|(name, reason)| format!("{}: {}", name, reason))
        .collect();
    summary.cancelled = ingest.cancelled;

    if let Some(path) = &args.intents {
        let intents = load_intents(path)?;
        log::info!("Replaying {} intent(s) from {:?}", intents.len(), path);
        for intent in intents {
            match session.apply(intent) {
                Ok(Effect::NoOp { reason }) => {
                    log::debug!("No-op intent: {}", reason);
                    summary.intents_applied += 1;
                }
                Ok(effect) => {
                    log::debug!("Applied: {:?}", effect);
                    summary.intents_applied += 1;
                }
                Err(e) if e.is_recoverable() => summary.intents_rejected += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    let dataset = session.export()?;
    summary.records = dataset.records.len();
    summary.excluded = dataset.excluded.len();
    summary.outlines = dataset.outlines.iter().map(|o| o.polygon_count()).sum();
    summary.issues = dataset.issues.len();

    let registry = FormatRegistry::new();
    log::debug!("Available formats: {:?}", registry.ids());
    let options = ExportOptions::from_config(&config.export);
    std::fs::create_dir_all(&args.output).map_err(FormatError::from)?;
    for id in OUTPUT_FORMATS {
        let format = registry.get(id).ok_or(CliError::UnknownFormat(id))?;
        let result = format.export(&dataset, &args.output, &options)?;
        for warning in &result.warnings {
            match warning.severity {
                WarningSeverity::Info => log::info!("{}: {}", format.display_name(), warning.message),
                WarningSeverity::Warning => log::warn!("{}: {}", format.display_name(), warning.message),
            }
        }
        summary.files.extend(result.files_created);
    }

    log::info!("Run finished in {:.2?}", start.elapsed());
    Ok(summary)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match CurationConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    env_logger::Builder::new()
        .filter_level(config.log_level.to_level_filter())
        .parse_default_env()
        .init();

    match run(&args, &config) {
        Ok(summary) => {
            match serde_json::to_string_pretty(&summary) {
                Ok(json) => println!("{}", json),
                Err(e) => log::error!("Failed to serialize summary: {}", e),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

//! MoodMap CLI - Command-line interface for the insight engine
//!
//! Commands:
//! - analyze: Run the engine over exported mood records
//! - validate: Check records against the data model ranges
//! - config: Print the effective engine configuration

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use moodmap_insights::config::{EngineConfig, ScaleConfig};
use moodmap_insights::source::{AnalysisWindow, InMemoryRecordSource};
use moodmap_insights::types::MoodRecord;
use moodmap_insights::{InsightEngine, InsightError, InsightReport, RecordReader, ENGINE_VERSION};

/// MoodMap - behavioral insights from daily mood logs
#[derive(Parser)]
#[command(name = "moodmap")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Turn daily mood logs into ranked insights", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the insight engine over mood records
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Engine configuration file (JSON, missing keys use defaults)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Analyze only the last N days up to --as-of (default: every record)
        #[arg(long)]
        days: Option<u32>,

        /// Reference date for --days (YYYY-MM-DD, default: today)
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// User the records belong to
        #[arg(long, default_value = "local")]
        user_id: String,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Check records against the data model ranges
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Engine configuration file whose scale the records are checked against
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective engine configuration
    Config {
        /// Configuration file to merge over the defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// JSON array of records
    Json,
    /// Newline-delimited JSON (one record per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one insight per line)
    Ndjson,
    /// Full report as compact JSON
    Json,
    /// Full report as pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_ansi(atty::is(atty::Stream::Stderr)),
        )
        .init();
}

fn run(cli: Cli) -> Result<(), MoodmapCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            input_format,
            config,
            days,
            as_of,
            user_id,
            output,
            output_format,
        } => cmd_analyze(
            &input,
            input_format,
            config.as_deref(),
            days,
            as_of,
            &user_id,
            &output,
            output_format,
        ),

        Commands::Validate {
            input,
            input_format,
            config,
            json,
        } => cmd_validate(&input, input_format, config.as_deref(), json),

        Commands::Config { config } => cmd_config(config.as_deref()),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_analyze(
    input: &Path,
    input_format: InputFormat,
    config: Option<&Path>,
    days: Option<u32>,
    as_of: Option<NaiveDate>,
    user_id: &str,
    output: &Path,
    output_format: OutputFormat,
) -> Result<(), MoodmapCliError> {
    let records = read_records(input, &input_format)?;
    if records.is_empty() {
        return Err(MoodmapCliError::NoRecords);
    }

    let engine = InsightEngine::new(load_config(config)?)?;

    let (window, reference) = match days {
        Some(days) => {
            let reference = match as_of {
                Some(date) => end_of_day(date)?,
                None => Utc::now(),
            };
            (AnalysisWindow::LastDays(days), reference)
        }
        None => {
            // whole export
            let first = records.iter().map(MoodRecord::day).min();
            let last = records.iter().map(MoodRecord::day).max();
            match (first, last) {
                (Some(start), Some(end)) => (AnalysisWindow::Range { start, end }, Utc::now()),
                _ => return Err(MoodmapCliError::NoRecords),
            }
        }
    };
    debug!(?window, records = records.len(), "analyzing export");

    let mut source = InMemoryRecordSource::new();
    source.insert(user_id, records);

    let report = engine.generate_at(user_id, window, reference, &source, None)?;
    let output_data = format_output(&report, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    config: Option<&Path>,
    json: bool,
) -> Result<(), MoodmapCliError> {
    let records = read_records(input, &input_format)?;
    let config = load_config(config)?;
    let report = validation_report(&records, &config.scale);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Record {} ({}): {}", err.index, err.timestamp, err.error);
            }
        }
    }

    if report.invalid_records > 0 {
        Err(MoodmapCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn validation_report(records: &[MoodRecord], scale: &ScaleConfig) -> ValidationReport {
    let failures = RecordReader::validate_records(records, scale);
    ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - failures.len(),
        invalid_records: failures.len(),
        errors: failures
            .iter()
            .map(|f| ValidationErrorDetail {
                index: f.index,
                timestamp: f.timestamp.clone(),
                error: f.issue.to_string(),
            })
            .collect(),
    }
}

fn cmd_config(config: Option<&Path>) -> Result<(), MoodmapCliError> {
    let config = load_config(config)?;
    config.validate()?;
    println!("{}", config.to_json()?);
    Ok(())
}

// Helper functions

fn read_records(input: &Path, format: &InputFormat) -> Result<Vec<MoodRecord>, MoodmapCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(MoodmapCliError::NoInput);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let records = match format {
        InputFormat::Json => RecordReader::parse_array(&input_data)?,
        InputFormat::Ndjson => RecordReader::parse_ndjson(&input_data)?,
    };
    Ok(records)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, MoodmapCliError> {
    match path {
        Some(path) => Ok(EngineConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(EngineConfig::default()),
    }
}

fn end_of_day(date: NaiveDate) -> Result<DateTime<Utc>, MoodmapCliError> {
    date.and_hms_opt(23, 59, 59)
        .map(|t| t.and_utc())
        .ok_or(MoodmapCliError::InvalidDate(date))
}

fn format_output(report: &InsightReport, format: &OutputFormat) -> Result<String, MoodmapCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for insight in &report.insights {
                lines.push(serde_json::to_string(insight)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(report)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(report)? + "\n"),
    }
}

// Error types

#[derive(Debug)]
enum MoodmapCliError {
    Io(io::Error),
    Engine(InsightError),
    Json(serde_json::Error),
    NoInput,
    NoRecords,
    InvalidDate(NaiveDate),
    ValidationFailed(usize),
}

impl From<io::Error> for MoodmapCliError {
    fn from(e: io::Error) -> Self {
        MoodmapCliError::Io(e)
    }
}

impl From<InsightError> for MoodmapCliError {
    fn from(e: InsightError) -> Self {
        MoodmapCliError::Engine(e)
    }
}

impl From<serde_json::Error> for MoodmapCliError {
    fn from(e: serde_json::Error) -> Self {
        MoodmapCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<MoodmapCliError> for CliError {
    fn from(e: MoodmapCliError) -> Self {
        match e {
            MoodmapCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            MoodmapCliError::Engine(e) => {
                let code = match &e {
                    InsightError::InsufficientData(_) => "INSUFFICIENT_DATA",
                    InsightError::Configuration(_) => "CONFIG_ERROR",
                    InsightError::Source(_) => "SOURCE_ERROR",
                    InsightError::Parse(_) | InsightError::Json(_) => "PARSE_ERROR",
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(e.user_message().to_string()),
                }
            }
            MoodmapCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            MoodmapCliError::NoInput => CliError {
                code: "NO_INPUT".to_string(),
                message: "stdin is a terminal, nothing to read".to_string(),
                hint: Some("Pipe records in or pass --input <file>".to_string()),
            },
            MoodmapCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No mood records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            MoodmapCliError::InvalidDate(date) => CliError {
                code: "INVALID_DATE".to_string(),
                message: format!("Cannot use {} as a reference date", date),
                hint: Some("Pass --as-of as YYYY-MM-DD".to_string()),
            },
            MoodmapCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Invalid records are skipped by 'moodmap analyze'".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    timestamp: String,
    error: String,
}

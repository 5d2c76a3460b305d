//! moodset-acquire - mood dataset acquisition CLI
//!
//! Subcommands:
//! - `link <URL>...`: acquire tracks from direct links
//! - `query <TEXT>...`: resolve free-text queries, then acquire
//! - `batch <FILE>`: one link or query per line
//! - `dataset <DIR>`: assemble a feature table from canonical waveforms
//!
//! Exit status is non-zero when any track fails.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use moodset_acquire::dataset::{DatasetAssembler, HeaderExtractor};
use moodset_acquire::types::TrackRequest;
use moodset_acquire::utils::{ConsoleOutput, NoopConsole, TerminalConsole};
use moodset_acquire::{
    AcquisitionOrchestrator, BatchReport, CliOverrides, PipelineSettings, TrackOutcome,
};
use moodset_common::config::{load_or_default, resolve_config_path, TargetLength, TranscoderKind};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "moodset-acquire",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ", ", env!("BUILD_PROFILE"), ")"),
    about = "Acquire and normalize audio for a music-mood dataset"
)]
struct Cli {
    /// Config file (default: $MOODSET_CONFIG, then <config dir>/moodset/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Acquire tracks from direct media links
    Link {
        #[arg(required = true)]
        urls: Vec<String>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Resolve free-text queries to links, then acquire
    Query {
        #[arg(required = true)]
        queries: Vec<String>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Acquire every request listed in a file (one per line, `#` comments)
    Batch {
        file: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Build a feature table from canonical waveforms
    Dataset {
        dir: PathBuf,
        /// Write JSON here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Directory for downloads and canonical waveforms
    #[arg(long)]
    download_path: Option<PathBuf>,

    /// Canonical sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// "full" or a number of seconds
    #[arg(long)]
    target_length: Option<TargetLength>,

    /// Search hits longer than this many seconds are rejected
    #[arg(long)]
    max_search_duration: Option<u64>,

    /// Tracks processed at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Keep terminal output between tracks
    #[arg(long)]
    no_clear_log: bool,

    /// ffmpeg or native
    #[arg(long)]
    transcoder: Option<TranscoderKind>,

    /// Write a JSON batch report to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

impl RunArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            download_path: self.download_path.clone(),
            sample_rate: self.sample_rate,
            target_length: self.target_length,
            max_search_duration: self.max_search_duration,
            concurrency: self.concurrency,
            no_clear_log: self.no_clear_log,
            transcoder: self.transcoder,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let mut toml_config = load_or_default(config_path.as_deref())?;
    if let Some(level) = &cli.log_level {
        toml_config.logging.level = level.clone();
    }

    moodset_common::logging::init(&toml_config.logging)?;

    info!(
        "Starting moodset-acquire {} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) if path.exists() => info!("Config: {}", path.display()),
        Some(path) => warn!("Config file {} not found, using defaults", path.display()),
        None => warn!("No config location available, using defaults"),
    }

    match cli.command {
        Command::Link { urls, run } => {
            let requests = urls.into_iter().map(TrackRequest::Link).collect();
            run_batch(&toml_config, &run, requests).await
        }
        Command::Query { mut queries, run } if queries.len() == 1 => {
            let query = queries.remove(0);
            run_single_query(&toml_config, &run, &query).await
        }
        Command::Query { queries, run } => {
            let requests = queries.into_iter().map(TrackRequest::Query).collect();
            run_batch(&toml_config, &run, requests).await
        }
        Command::Batch { file, run } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read batch file {}", file.display()))?;
            let requests = TrackRequest::parse_batch(&text);
            info!("Batch file {}: {} request(s)", file.display(), requests.len());
            run_batch(&toml_config, &run, requests).await
        }
        Command::Dataset { dir, output } => run_dataset(&dir, output.as_deref()),
    }
}

fn build_orchestrator(settings: &PipelineSettings) -> Result<AcquisitionOrchestrator> {
    let console: Arc<dyn ConsoleOutput> = if settings.options.clear_log && std::io::stdout().is_terminal() {
        Arc::new(TerminalConsole)
    } else {
        Arc::new(NoopConsole)
    };

    info!(
        download_path = %settings.options.download_path.display(),
        sample_rate = settings.options.sample_rate,
        target_length = %settings.options.target_length,
        transcoder = %settings.transcoder,
        concurrency = settings.concurrency,
        "Pipeline configured"
    );

    Ok(AcquisitionOrchestrator::from_settings(settings)
        .context("Failed to initialize media backend")?
        .with_console(console))
}

async fn run_single_query(
    toml_config: &moodset_common::config::TomlConfig,
    run: &RunArgs,
    query: &str,
) -> Result<ExitCode> {
    let settings = PipelineSettings::resolve(toml_config, &run.overrides())?;
    let orchestrator = build_orchestrator(&settings)?;

    match orchestrator.acquire_from_query(query, &settings.options).await {
        Ok(TrackOutcome::Completed(waveform)) => {
            println!("ok    {}", waveform.path.display());
            Ok(ExitCode::SUCCESS)
        }
        Ok(TrackOutcome::Failed(e)) => {
            println!("FAIL  [{}] {}", e.kind(), e);
            Ok(ExitCode::FAILURE)
        }
        // Unresolvable query is a hard failure
        Err(e) => Err(anyhow::Error::new(e)),
    }
}

async fn run_batch(
    toml_config: &moodset_common::config::TomlConfig,
    run: &RunArgs,
    requests: Vec<TrackRequest>,
) -> Result<ExitCode> {
    let settings = PipelineSettings::resolve(toml_config, &run.overrides())?;
    let orchestrator = build_orchestrator(&settings)?;

    let report = orchestrator
        .acquire_batch(requests, &settings.options, settings.concurrency)
        .await;

    print_report(&report);

    if let Some(path) = &run.report {
        let json = serde_json::to_string_pretty(&report.summary())?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    Ok(if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_report(report: &BatchReport) {
    for track in &report.completed {
        println!("ok    {}", track.waveform.path.display());
    }
    for failure in &report.failures {
        println!(
            "FAIL  [{}] {} ({}): {}",
            failure.error.kind(),
            failure.request,
            failure.state,
            failure.error
        );
    }
    println!(
        "{} completed, {} failed, {} total",
        report.completed.len(),
        report.failures.len(),
        report.total()
    );
}

fn run_dataset(dir: &std::path::Path, output: Option<&std::path::Path>) -> Result<ExitCode> {
    let assembler = DatasetAssembler::new(HeaderExtractor::all());
    let table = assembler
        .build(dir)
        .with_context(|| format!("Failed to assemble dataset from {}", dir.display()))?;

    match output {
        Some(path) => {
            table
                .write_json(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} row(s) to {}", table.len(), path.display());
        }
        None => println!("{}", table.to_json()?),
    }
    Ok(ExitCode::SUCCESS)
}

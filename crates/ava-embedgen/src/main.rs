//! `ava-embedgen` command-line entry point.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use ava_embedgen::{GeneratePlan, build_engine, build_matcher, discover_sources, generate};
use ava_embeddings::GeneratorConfig;
use ava_embeddings::config::expand_home;
use ava_settings::{EmbedGenSettings, LogFormat, LoggingSettings};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "ava-embedgen",
    version,
    about = "Generate pre-computed intent embeddings for on-device classification"
)]
struct Cli {
    /// Log output format (overrides `logging.format`).
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Embed every discovered intent and write the artifacts.
    Generate(GenerateArgs),
    /// Decode an AOT file and print its summary.
    Inspect {
        /// AOT file to read.
        path: PathBuf,
    },
}

#[derive(Debug, Args)]
struct GenerateArgs {
    /// ONNX model file.
    #[arg(long)]
    model: Option<String>,

    /// Newline-delimited vocabulary file.
    #[arg(long)]
    vocab: Option<String>,

    /// Directory searched recursively for intent files (repeatable).
    #[arg(long = "source-dir")]
    source_dirs: Vec<String>,

    /// Flat `{"intent": ["example", ...]}` JSON file.
    #[arg(long)]
    intents: Option<String>,

    /// Upsert script destination.
    #[arg(long)]
    output_sql: Option<String>,

    /// AOT container destination.
    #[arg(long)]
    output_aot: Option<String>,

    /// Model version stamped into both artifacts.
    #[arg(long)]
    model_version: Option<String>,

    /// Locale stamped on every row.
    #[arg(long)]
    locale: Option<String>,

    /// Maximum in-flight examples per intent.
    #[arg(long)]
    concurrency: Option<usize>,

    /// JSON run report destination.
    #[arg(long)]
    report: Option<String>,

    /// Use the deterministic mock engine with this output width.
    #[arg(long)]
    mock_dim: Option<usize>,

    /// Settings file (default `~/.ava/embedgen.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_file = match &cli.command {
        Command::Generate(args) => args.settings.as_deref(),
        Command::Inspect { .. } => None,
    };
    let mut settings = load_settings(settings_file)?;
    if let Command::Generate(args) = &cli.command {
        apply_cli_overrides(&mut settings, args);
    }
    settings.validate();

    init_logging(&settings.logging, cli.log_format.map(LogFormat::from));

    match cli.command {
        Command::Generate(args) => run_generate(&settings, args.mock_dim).await,
        Command::Inspect { path } => run_inspect(&path),
    }
}

fn load_settings(path: Option<&Path>) -> Result<EmbedGenSettings> {
    match path {
        Some(path) => ava_settings::load_settings_from_path(path)
            .with_context(|| format!("failed to load settings: {}", path.display())),
        None => ava_settings::load_settings().context("failed to load settings"),
    }
}

/// Command-line flags take precedence over file and environment settings.
fn apply_cli_overrides(settings: &mut EmbedGenSettings, args: &GenerateArgs) {
    if let Some(v) = &args.model {
        settings.model.path = Some(v.clone());
    }
    if let Some(v) = &args.vocab {
        settings.model.vocab_path = Some(v.clone());
    }
    if !args.source_dirs.is_empty() {
        settings.sources.dirs.clone_from(&args.source_dirs);
    }
    if let Some(v) = &args.intents {
        settings.sources.intents_file = Some(v.clone());
    }
    if let Some(v) = &args.output_sql {
        settings.output.sql_path = Some(v.clone());
    }
    if let Some(v) = &args.output_aot {
        settings.output.aot_path = Some(v.clone());
    }
    if let Some(v) = &args.report {
        settings.output.report_path = Some(v.clone());
    }
    if let Some(v) = &args.model_version {
        settings.model.version.clone_from(v);
    }
    if let Some(v) = &args.locale {
        settings.locale.clone_from(v);
    }
    if let Some(v) = args.concurrency {
        settings.inference.concurrency = v;
    }
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingSettings, format_override: Option<LogFormat>) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format_override.unwrap_or(logging.format) {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run_generate(settings: &EmbedGenSettings, mock_dim: Option<usize>) -> Result<()> {
    let output = &settings.output;
    if output.sql_path.is_none() && output.aot_path.is_none() {
        bail!("no output configured (use --output-sql and/or --output-aot)");
    }

    let matcher = build_matcher(&settings.sources.patterns).context("invalid source pattern")?;
    let dirs: Vec<PathBuf> = settings.sources.dirs.iter().map(|d| expand_home(d)).collect();
    let source_files = discover_sources(&dirs, &matcher);
    info!(dirs = dirs.len(), files = source_files.len(), "source discovery complete");

    let plan = GeneratePlan {
        config: GeneratorConfig::from_settings(settings),
        source_files,
        intents_file: settings.sources.intents_file.as_deref().map(expand_home),
        sql_path: output.sql_path.as_deref().map(expand_home),
        aot_path: output.aot_path.as_deref().map(expand_home),
        report_path: output.report_path.as_deref().map(expand_home),
    };

    let engine = build_engine(&plan.config, mock_dim)?;
    let report = generate(&plan, engine, chrono::Utc::now()).await?;

    let run = &report.embedding;
    info!(
        requested = run.intents_requested,
        succeeded = run.intents_succeeded,
        dropped = run.dropped_intents.len(),
        examples_embedded = run.examples_embedded,
        examples_skipped = run.examples_skipped,
        dimension = report.dimension,
        "generation complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_inspect(path: &Path) -> Result<()> {
    let file = ava_embedgen::read_aot(path)?;
    let summary = ava_embedgen::summarize(&file);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

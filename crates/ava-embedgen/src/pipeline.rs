//! One generation run: parse and merge sources, embed, write artifacts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use ava_embeddings::sources::{self, IntentTable, ParseOutcome};
use ava_embeddings::{
    GeneratorConfig, InferenceEngine, IntentEmbedder, RunReport, Tokenizer, Vocabulary, aot, sql,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Per-file parse tallies.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStats {
    /// Files that yielded at least one intent.
    pub files_parsed: usize,
    /// Files with no meaningful content.
    pub files_empty: usize,
    /// Files that could not be read or parsed.
    pub files_failed: usize,
}

/// Inputs and destinations of one run.
#[derive(Clone, Debug, Default)]
pub struct GeneratePlan {
    /// Model, vocabulary and stamping configuration.
    pub config: GeneratorConfig,
    /// Discovered source files, in merge order.
    pub source_files: Vec<PathBuf>,
    /// Flat `{ "intent": [examples] }` JSON, merged before the source files.
    pub intents_file: Option<PathBuf>,
    /// Upsert script destination.
    pub sql_path: Option<PathBuf>,
    /// AOT container destination.
    pub aot_path: Option<PathBuf>,
    /// JSON report destination.
    pub report_path: Option<PathBuf>,
}

/// Summary of a finished run.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReport {
    /// Run timestamp, shared by every generated row.
    pub generated_at: DateTime<Utc>,
    /// Model version stamped into the artifacts.
    pub model_version: String,
    /// Locale stamped into the artifacts.
    pub locale: String,
    /// Vector width of the written records.
    pub dimension: u32,
    /// Source parse tallies.
    pub sources: SourceStats,
    /// Embedding tallies.
    pub embedding: RunReport,
    /// Written upsert script, if any.
    pub sql_path: Option<PathBuf>,
    /// Written AOT container, if any.
    pub aot_path: Option<PathBuf>,
}

/// Read, classify, parse and merge every source into one table.
///
/// Unreadable or unparsable source files are counted and skipped. The
/// intents file is explicit input, so failing to read or parse it is fatal.
pub fn load_sources(
    intents_file: Option<&Path>,
    source_files: &[PathBuf],
) -> Result<(IntentTable, SourceStats)> {
    let mut table = IntentTable::new();
    let mut stats = SourceStats::default();

    if let Some(path) = intents_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read intents file: {}", path.display()))?;
        let parsed = sources::load_intents_json(&content)
            .with_context(|| format!("failed to parse intents file: {}", path.display()))?;
        info!(path = %path.display(), intents = parsed.len(), "loaded intents file");
        table = table.merge(parsed);
    }

    for path in source_files {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read source file");
                stats.files_failed += 1;
                continue;
            }
        };
        let format = sources::classify(&content);
        match sources::parse_source(&content) {
            ParseOutcome::Parsed(parsed) => {
                debug!(
                    path = %path.display(),
                    ?format,
                    intents = parsed.len(),
                    "parsed source file"
                );
                stats.files_parsed += 1;
                table = table.merge(parsed);
            }
            ParseOutcome::Empty => {
                debug!(path = %path.display(), ?format, "source file has no intents");
                stats.files_empty += 1;
            }
            ParseOutcome::Failed(reason) => {
                warn!(path = %path.display(), ?format, reason = %reason, "failed to parse source file");
                stats.files_failed += 1;
            }
        }
    }

    info!(
        intents = table.len(),
        examples = table.example_count(),
        files_parsed = stats.files_parsed,
        files_empty = stats.files_empty,
        files_failed = stats.files_failed,
        "sources merged"
    );
    Ok((table, stats))
}

/// Run the full pipeline with the given engine.
pub async fn generate(
    plan: &GeneratePlan,
    engine: Arc<dyn InferenceEngine>,
    generated_at: DateTime<Utc>,
) -> Result<GenerateReport> {
    let config = &plan.config;

    let Some(vocab_path) = config.resolved_vocab_path() else {
        bail!("no vocabulary configured (use --vocab or model.vocabPath)");
    };
    let vocab = Vocabulary::load(&vocab_path)
        .with_context(|| format!("failed to load vocabulary: {}", vocab_path.display()))?;
    info!(path = %vocab_path.display(), tokens = vocab.len(), "vocabulary loaded");
    let tokenizer = Tokenizer::new(Arc::new(vocab), config.max_length)?;

    let (table, source_stats) = load_sources(plan.intents_file.as_deref(), &plan.source_files)?;
    if table.is_empty() {
        bail!("no intents found");
    }

    match engine.dimensions() {
        Some(width) => info!(width, "inference engine ready"),
        None => info!("inference engine ready, width taken from first output"),
    }
    let embedder = IntentEmbedder::new(tokenizer, engine).with_concurrency(config.concurrency);
    let (records, run) = embedder
        .embed_table(&table, &config.model_version, &config.locale)
        .await;

    let dimension = records
        .first()
        .map_or(aot::DEFAULT_DIMENSION, |r| r.dimension() as u32);

    if let Some(path) = &plan.aot_path {
        let bytes = aot::encode(&records, &config.model_version)?;
        write_output(path, &bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), records = records.len(), "wrote AOT file");
    }

    if let Some(path) = &plan.sql_path {
        let script = sql::emit(&records, &config.model_version, &config.locale, generated_at);
        write_output(path, script.as_bytes()).await?;
        info!(path = %path.display(), records = records.len(), "wrote SQL script");
    }

    let report = GenerateReport {
        generated_at,
        model_version: config.model_version.clone(),
        locale: config.locale.clone(),
        dimension,
        sources: source_stats,
        embedding: run,
        sql_path: plan.sql_path.clone(),
        aot_path: plan.aot_path.clone(),
    };

    if let Some(path) = &plan.report_path {
        let encoded = serde_json::to_string_pretty(&report)?;
        write_output(path, encoded.as_bytes()).await?;
        info!(path = %path.display(), "wrote run report");
    }

    Ok(report)
}

/// Write an artifact wholesale, creating parent directories.
pub async fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create output dir: {}", parent.display()))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write output: {}", path.display()))
}

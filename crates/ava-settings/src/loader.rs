//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`EmbedGenSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `AVA_*` environment variable overrides
//! 4. Clamp invalid values via [`EmbedGenSettings::validate`]
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{EmbedGenSettings, LogFormat};

/// Resolve the default settings file path (`~/.ava/embedgen.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".ava").join("embedgen.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<EmbedGenSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. A file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<EmbedGenSettings> {
    let defaults = serde_json::to_value(EmbedGenSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: EmbedGenSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate();
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (file/default value is kept).
pub fn apply_env_overrides(settings: &mut EmbedGenSettings) {
    if let Some(v) = read_env_string("AVA_LOCALE") {
        settings.locale = v;
    }

    // ── Model ───────────────────────────────────────────────────────
    if let Some(v) = read_env_string("AVA_MODEL_PATH") {
        settings.model.path = Some(v);
    }
    if let Some(v) = read_env_string("AVA_VOCAB_PATH") {
        settings.model.vocab_path = Some(v);
    }
    if let Some(v) = read_env_string("AVA_MODEL_VERSION") {
        settings.model.version = v;
    }
    if let Some(v) = read_env_usize("AVA_MAX_LENGTH", 2, 4096) {
        settings.model.max_length = v;
    }

    // ── Sources / output ────────────────────────────────────────────
    if let Some(v) = read_env_string("AVA_SOURCE_DIRS") {
        settings.sources.dirs = split_path_list(&v);
    }
    if let Some(v) = read_env_string("AVA_OUTPUT_SQL") {
        settings.output.sql_path = Some(v);
    }
    if let Some(v) = read_env_string("AVA_OUTPUT_AOT") {
        settings.output.aot_path = Some(v);
    }

    // ── Inference / logging ─────────────────────────────────────────
    if let Some(v) = read_env_usize("AVA_INFERENCE_CONCURRENCY", 1, 256) {
        settings.inference.concurrency = v;
    }
    if let Some(v) = read_env_string("AVA_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_string("AVA_LOG_FORMAT") {
        match parse_log_format(&v) {
            Some(format) => settings.logging.format = format,
            None => tracing::warn!(value = %v, "invalid AVA_LOG_FORMAT, ignoring"),
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a log format name (case-insensitive).
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.to_lowercase().as_str() {
        "text" | "pretty" => Some(LogFormat::Text),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

/// Split a `:`-separated directory list, dropping empty entries.
pub fn split_path_list(val: &str) -> Vec<String> {
    val.split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

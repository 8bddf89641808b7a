//! Generator configuration.

use std::path::PathBuf;

use ava_settings::EmbedGenSettings;
use serde::{Deserialize, Serialize};

/// Resolved configuration for one generation run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorConfig {
    /// Locale tag stamped on every record.
    pub locale: String,
    /// Model version stamped into both artifacts.
    pub model_version: String,
    /// ONNX model file (may contain `~`).
    pub model_path: Option<String>,
    /// Vocabulary file (may contain `~`).
    pub vocab_path: Option<String>,
    /// Fixed tokenized sequence length.
    pub max_length: usize,
    /// Intra-op threads for the ONNX session.
    pub intra_threads: usize,
    /// Maximum in-flight examples per intent.
    pub concurrency: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::from_settings(&EmbedGenSettings::default())
    }
}

impl GeneratorConfig {
    /// Create config from settings.
    pub fn from_settings(s: &EmbedGenSettings) -> Self {
        Self {
            locale: s.locale.clone(),
            model_version: s.model.version.clone(),
            model_path: s.model.path.clone(),
            vocab_path: s.model.vocab_path.clone(),
            max_length: s.model.max_length,
            intra_threads: s.model.intra_threads.max(1),
            concurrency: s.inference.concurrency.max(1),
        }
    }

    /// Model path with `~/` expanded.
    pub fn resolved_model_path(&self) -> Option<PathBuf> {
        self.model_path.as_deref().map(expand_home)
    }

    /// Vocabulary path with `~/` expanded.
    pub fn resolved_vocab_path(&self) -> Option<PathBuf> {
        self.vocab_path.as_deref().map(expand_home)
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

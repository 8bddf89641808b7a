//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`,
//! so a settings file only needs the fields it overrides.

use serde::{Deserialize, Serialize};

/// Sequence length the bundled BERT-style models were exported with.
pub const DEFAULT_MAX_LENGTH: usize = 128;

/// Root settings for the embedding generator.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbedGenSettings {
    /// Locale tag written into every generated row.
    pub locale: String,
    /// Model and vocabulary settings.
    pub model: ModelSettings,
    /// Where intent sources are discovered.
    pub sources: SourceSettings,
    /// Artifact destinations.
    pub output: OutputSettings,
    /// Inference scheduling.
    pub inference: InferenceSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for EmbedGenSettings {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            model: ModelSettings::default(),
            sources: SourceSettings::default(),
            output: OutputSettings::default(),
            inference: InferenceSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl EmbedGenSettings {
    /// Correct out-of-range values in place.
    ///
    /// Values are clamped with a warning rather than rejected.
    pub fn validate(&mut self) {
        if self.inference.concurrency == 0 {
            tracing::warn!("inference.concurrency must be at least 1, clamped to 1");
            self.inference.concurrency = 1;
        }
        if self.model.max_length < 2 {
            tracing::warn!(
                max_length = self.model.max_length,
                "model.maxLength must leave room for [CLS] and [SEP], clamped to 2"
            );
            self.model.max_length = 2;
        }
        if self.locale.trim().is_empty() {
            tracing::warn!("locale is empty, falling back to en-US");
            self.locale = "en-US".to_string();
        }
    }
}

/// Model and vocabulary settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelSettings {
    /// Path to the ONNX model file.
    pub path: Option<String>,
    /// Path to the newline-delimited `vocab.txt`.
    pub vocab_path: Option<String>,
    /// Model version string stamped into both artifacts.
    pub version: String,
    /// Fixed token sequence length fed to the model.
    pub max_length: usize,
    /// Intra-op thread count for the ONNX session.
    pub intra_threads: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            path: None,
            vocab_path: None,
            version: "AVA-384-Base-INT8".to_string(),
            max_length: DEFAULT_MAX_LENGTH,
            intra_threads: 2,
        }
    }
}

/// Intent source discovery settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceSettings {
    /// Directories searched recursively for intent files.
    pub dirs: Vec<String>,
    /// Glob patterns (relative to each directory) selecting intent files.
    pub patterns: Vec<String>,
    /// Optional flat `{ "intent": ["example", ...] }` JSON file.
    pub intents_file: Option<String>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            dirs: Vec::new(),
            patterns: vec!["**/*.anl".to_string(), "**/*.vos".to_string()],
            intents_file: None,
        }
    }
}

/// Artifact destinations.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputSettings {
    /// Generated upsert script.
    pub sql_path: Option<String>,
    /// Generated AOT backup container.
    pub aot_path: Option<String>,
    /// Optional JSON run report.
    pub report_path: Option<String>,
}

/// Inference scheduling.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InferenceSettings {
    /// Maximum in-flight examples per intent.
    pub concurrency: usize,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_bundled_model() {
        let s = EmbedGenSettings::default();
        assert_eq!(s.locale, "en-US");
        assert_eq!(s.model.version, "AVA-384-Base-INT8");
        assert_eq!(s.model.max_length, 128);
        assert_eq!(s.sources.patterns, vec!["**/*.anl", "**/*.vos"]);
        assert_eq!(s.inference.concurrency, 1);
        assert_eq!(s.logging.format, LogFormat::Text);
    }

    #[test]
    fn serde_camel_case() {
        let value = serde_json::to_value(EmbedGenSettings::default()).unwrap();
        assert!(value["model"].get("maxLength").is_some());
        assert!(value["model"].get("vocabPath").is_some());
        assert!(value["sources"].get("intentsFile").is_some());
        assert!(value["model"].get("max_length").is_none());
    }

    #[test]
    fn partial_json_with_defaults() {
        let s: EmbedGenSettings =
            serde_json::from_str(r#"{"locale": "de-DE", "model": {"version": "m2"}}"#).unwrap();
        assert_eq!(s.locale, "de-DE");
        assert_eq!(s.model.version, "m2");
        assert_eq!(s.model.max_length, 128);
    }

    #[test]
    fn log_format_lowercase() {
        let f: LogFormat = serde_json::from_str(r#""json""#).unwrap();
        assert_eq!(f, LogFormat::Json);
    }

    #[test]
    fn validate_clamps_out_of_range() {
        let mut s = EmbedGenSettings::default();
        s.inference.concurrency = 0;
        s.model.max_length = 1;
        s.locale = "  ".to_string();
        s.validate();
        assert_eq!(s.inference.concurrency, 1);
        assert_eq!(s.model.max_length, 2);
        assert_eq!(s.locale, "en-US");
    }
}

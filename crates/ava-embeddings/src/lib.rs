//! # ava-embeddings
//!
//! Pre-computed intent embeddings for on-device intent classification.
//!
//! Turns a table of intents and their example phrases into one L2-normalized
//! vector per intent:
//! - Source parsing (legacy delimited files, two compact JSON dialects)
//! - BERT-style WordPiece tokenization to a fixed length
//! - Inference via `ort` (feature `ort`) or a deterministic mock
//! - Masked mean pooling, averaging across examples, L2 normalization
//! - Output as a binary AOT container and a SQLite upsert script
//!
//! ## Crate Position
//!
//! Depends on: ava-settings.
//! Depended on by: ava-embedgen.

#![deny(unsafe_code)]

pub mod aggregator;
pub mod aot;
pub mod config;
pub mod errors;
pub mod normalize;
#[cfg(feature = "ort")]
pub mod ort_service;
pub mod service;
pub mod sources;
pub mod sql;
pub mod tokenizer;

pub use aggregator::{IntentEmbedder, IntentEmbedding, IntentEmbeddingRecord, RunReport};
pub use aot::{AotFile, AotRecord};
pub use config::GeneratorConfig;
pub use errors::{EmbeddingError, Result};
pub use normalize::{l2_norm, l2_normalize, mean_pool, mean_vector};
#[cfg(feature = "ort")]
pub use ort_service::OnnxInferenceEngine;
pub use service::{HiddenStates, InferenceEngine, MockInferenceEngine};
pub use sources::{Intent, IntentTable, ParseOutcome, SourceFormat};
pub use tokenizer::{TokenizedSequence, Tokenizer, Vocabulary};

//! # ava-embedgen
//!
//! Build-time generator for the bundled intent embeddings.
//!
//! Discovers intent source files, merges them into one intent table, embeds
//! every intent and writes the AOT backup container and the SQLite upsert
//! script consumed on device.

#![deny(unsafe_code)]

pub mod discovery;
pub mod engine;
pub mod inspect;
pub mod pipeline;

pub use discovery::{build_matcher, discover_sources};
pub use engine::build_engine;
pub use inspect::{AotSummary, read_aot, summarize};
pub use pipeline::{GeneratePlan, GenerateReport, SourceStats, generate, load_sources};

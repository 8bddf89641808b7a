//! Summary of an existing AOT container.

use std::path::Path;

use anyhow::{Context, Result};
use ava_embeddings::{AotFile, aot, l2_norm};
use serde::Serialize;

/// Header fields plus a norm sanity check over all records.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AotSummary {
    /// Model version from the header, padding removed.
    pub model_version: String,
    /// Vector width.
    pub dimension: u32,
    /// Number of records.
    pub records: usize,
    /// Records whose vector norm is not within `1e-3` of 1.
    pub unnormalized: Vec<String>,
    /// First few intent ids, in file order.
    pub sample_ids: Vec<String>,
}

/// Number of intent ids listed in [`AotSummary::sample_ids`].
pub const SAMPLE_SIZE: usize = 10;

/// Read and decode `path`.
pub fn read_aot(path: &Path) -> Result<AotFile> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read AOT file: {}", path.display()))?;
    let file =
        aot::decode(&bytes).with_context(|| format!("failed to decode AOT file: {}", path.display()))?;
    Ok(file)
}

/// Summarize a decoded container.
pub fn summarize(file: &AotFile) -> AotSummary {
    let unnormalized = file
        .records
        .iter()
        .filter(|r| (l2_norm(&r.vector) - 1.0).abs() > 1e-3)
        .map(|r| r.intent_id.clone())
        .collect();
    AotSummary {
        model_version: file.model_version.clone(),
        dimension: file.dimension,
        records: file.records.len(),
        unnormalized,
        sample_ids: file
            .records
            .iter()
            .take(SAMPLE_SIZE)
            .map(|r| r.intent_id.clone())
            .collect(),
    }
}

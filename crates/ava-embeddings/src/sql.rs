//! Upsert script for the on-device `intent_embedding` table.
//!
//! The script first clears the bundled rows of one locale, then upserts every
//! record. Vectors are written as SQLite hex blob literals over their
//! little-endian float32 bytes.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::aggregator::IntentEmbeddingRecord;

/// Source tag marking rows shipped inside the application package.
pub const BUNDLED_SOURCE: &str = "BUNDLED_APK";

/// Normalization tag written for every row.
pub const NORMALIZATION: &str = "L2";

/// Render the full upsert script.
///
/// `generated_at` is used for both `created_at` and `updated_at` of every row.
pub fn emit(
    records: &[IntentEmbeddingRecord],
    model_version: &str,
    locale: &str,
    generated_at: DateTime<Utc>,
) -> String {
    let millis = generated_at.timestamp_millis();
    let locale_lit = quote(locale);
    let model_lit = quote(model_version);

    let mut out = String::new();
    out.push_str("-- Pre-computed intent embeddings\n");
    out.push_str("-- Generated by ava-embedgen\n");
    let _ = writeln!(out, "-- Model: {model_version}");
    let _ = writeln!(out, "-- Locale: {locale}");
    let _ = writeln!(
        out,
        "-- Generated: {}",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "-- Total embeddings: {}", records.len());
    out.push('\n');
    out.push_str("-- This file is auto-generated. Do not edit manually.\n");
    out.push_str("-- Regenerate with: ava-embedgen generate\n");
    out.push('\n');
    out.push_str("-- Clear existing bundled embeddings for this locale before inserting\n");
    let _ = writeln!(
        out,
        "DELETE FROM intent_embedding WHERE source = '{BUNDLED_SOURCE}' AND locale = {locale_lit};"
    );
    out.push('\n');
    out.push_str("-- Insert pre-computed embeddings\n");

    for record in records {
        let _ = writeln!(
            out,
            "INSERT OR REPLACE INTO intent_embedding (\n    \
             intent_id, locale, embedding_vector, embedding_dimension, model_version,\n    \
             normalization_type, ontology_id, created_at, updated_at, example_count, source\n\
             ) VALUES (\n    \
             {id}, {locale_lit}, {blob}, {dim}, {model_lit},\n    \
             '{NORMALIZATION}', NULL, {millis}, {millis}, {count}, '{BUNDLED_SOURCE}'\n\
             );\n",
            id = quote(&record.intent_id),
            blob = blob_literal(&record.vector),
            dim = record.dimension(),
            count = record.example_count,
        );
    }
    out
}

/// `X'…'` literal over the little-endian float32 bytes, uppercase hex.
pub fn blob_literal(vector: &[f32]) -> String {
    let bytes: Vec<u8> = vector.iter().flat_map(|x| x.to_le_bytes()).collect();
    format!("X'{}'", hex::encode_upper(bytes))
}

/// Single-quoted SQL string literal.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

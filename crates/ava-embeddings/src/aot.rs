//! AOT backup container for bundled intent vectors.
//!
//! Binary format (little-endian):
//!
//! ```text
//!   [4]  magic "AOT\0"
//!   [u32] format version (1)
//!   [u32] record count N
//!   [u32] vector dimension D
//!   [32] model version, UTF-8, null padded
//!   N × {
//!     [u32] id length L
//!     [L]   UTF-8 intent id
//!     [D × f32] vector
//!   }
//! ```
//!
//! The decoder validates the declared count and dimension against the buffer
//! length. That check is the only corruption detection the on-device
//! restore path relies on.

use crate::aggregator::IntentEmbeddingRecord;
use crate::errors::{EmbeddingError, Result};

/// File magic.
pub const MAGIC: [u8; 4] = *b"AOT\0";

/// Current (and only) format version.
pub const FORMAT_VERSION: u32 = 1;

/// Width of the model version field.
pub const MODEL_VERSION_LEN: usize = 32;

/// Header size in bytes.
pub const HEADER_LEN: usize = 16 + MODEL_VERSION_LEN;

/// Dimension written when there are no records.
pub const DEFAULT_DIMENSION: u32 = 384;

/// One decoded record.
#[derive(Clone, Debug, PartialEq)]
pub struct AotRecord {
    /// Intent identifier.
    pub intent_id: String,
    /// Vector components.
    pub vector: Vec<f32>,
}

/// A decoded container.
#[derive(Clone, Debug, PartialEq)]
pub struct AotFile {
    /// Model version from the header, padding stripped.
    pub model_version: String,
    /// Vector dimension from the header.
    pub dimension: u32,
    /// Records in file order.
    pub records: Vec<AotRecord>,
}

impl AotFile {
    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the container holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Serialize records in iteration order.
///
/// All records must share one dimension.
pub fn encode(records: &[IntentEmbeddingRecord], model_version: &str) -> Result<Vec<u8>> {
    let dimension = match records.first() {
        Some(first) => u32::try_from(first.dimension())
            .map_err(|_| EmbeddingError::Format("vector dimension exceeds u32".into()))?,
        None => DEFAULT_DIMENSION,
    };
    let count = u32::try_from(records.len())
        .map_err(|_| EmbeddingError::Format("record count exceeds u32".into()))?;

    let payload: usize = records
        .iter()
        .map(|r| 4 + r.intent_id.len() + 4 * r.vector.len())
        .sum();
    let mut buf = Vec::with_capacity(HEADER_LEN + payload);
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());
    buf.extend_from_slice(&dimension.to_le_bytes());
    buf.extend_from_slice(&model_version_field(model_version));

    for record in records {
        if record.dimension() != dimension as usize {
            return Err(EmbeddingError::Format(format!(
                "intent {} has dimension {}, expected {dimension}",
                record.intent_id,
                record.dimension()
            )));
        }
        let id = record.intent_id.as_bytes();
        let id_len = u32::try_from(id.len())
            .map_err(|_| EmbeddingError::Format("intent id exceeds u32 length".into()))?;
        buf.extend_from_slice(&id_len.to_le_bytes());
        buf.extend_from_slice(id);
        for x in &record.vector {
            buf.extend_from_slice(&x.to_le_bytes());
        }
    }
    Ok(buf)
}

/// Null-padded model version, truncated on a character boundary.
fn model_version_field(model_version: &str) -> [u8; MODEL_VERSION_LEN] {
    let mut end = model_version.len().min(MODEL_VERSION_LEN);
    while !model_version.is_char_boundary(end) {
        end -= 1;
    }
    let mut field = [0u8; MODEL_VERSION_LEN];
    field[..end].copy_from_slice(&model_version.as_bytes()[..end]);
    field
}

/// Parse a container, rejecting anything inconsistent with its header.
pub fn decode(bytes: &[u8]) -> Result<AotFile> {
    let mut reader = Reader::new(bytes);

    let magic = reader.take(MAGIC.len(), "magic")?;
    if magic != MAGIC.as_slice() {
        return Err(EmbeddingError::Format(format!("bad magic {magic:02x?}")));
    }
    let version = reader.u32("format version")?;
    if version != FORMAT_VERSION {
        return Err(EmbeddingError::Format(format!(
            "unsupported format version {version}"
        )));
    }
    let count = reader.u32("record count")? as usize;
    let dimension = reader.u32("dimension")?;
    let version_field = reader.take(MODEL_VERSION_LEN, "model version")?;
    let used = version_field
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(MODEL_VERSION_LEN);
    let model_version = std::str::from_utf8(&version_field[..used])
        .map_err(|e| EmbeddingError::Format(format!("model version is not UTF-8: {e}")))?
        .to_string();

    // Every record needs at least its length prefix and vector.
    let vector_len = dimension as usize * 4;
    let min_record = 4 + vector_len;
    if count.saturating_mul(min_record) > reader.remaining() {
        return Err(EmbeddingError::Format(format!(
            "header declares {count} records of dimension {dimension}, buffer has {} payload bytes",
            reader.remaining()
        )));
    }

    let mut records = Vec::with_capacity(count);
    for n in 0..count {
        let id_len = reader.u32("id length")? as usize;
        let id = reader.take(id_len, "intent id")?;
        let intent_id = std::str::from_utf8(id)
            .map_err(|e| EmbeddingError::Format(format!("record {n} id is not UTF-8: {e}")))?
            .to_string();
        let vector = reader
            .take(vector_len, "vector")?
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        records.push(AotRecord { intent_id, vector });
    }

    if reader.remaining() > 0 {
        return Err(EmbeddingError::Format(format!(
            "{} trailing bytes after {count} records",
            reader.remaining()
        )));
    }

    Ok(AotFile {
        model_version,
        dimension,
        records,
    })
}

/// Bounds-checked cursor over the input buffer.
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(EmbeddingError::Format(format!(
                "truncated at offset {}: need {len} bytes for {what}, have {}",
                self.offset,
                self.remaining()
            )));
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

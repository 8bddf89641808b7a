//! Inference engine trait and mock implementation.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use ndarray::Array2;
use sha2::{Digest, Sha256};

use crate::errors::{EmbeddingError, Result};
use crate::tokenizer::TokenizedSequence;

/// Per-position hidden states, shape `[sequence_length, dimensions]`.
pub type HiddenStates = Array2<f32>;

/// Maps one tokenized sequence to its last hidden state.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Run the model on a single fixed-length sequence.
    async fn infer(&self, input: &TokenizedSequence) -> Result<HiddenStates>;

    /// Output width, when known before the first call. Outputs of any
    /// other width are rejected.
    fn dimensions(&self) -> Option<usize>;
}

/// Mock inference engine for tests and dry runs.
///
/// Hidden states are derived from SHA-256 of the input ids and the position,
/// so identical sequences always produce identical outputs.
pub struct MockInferenceEngine {
    dims: usize,
    failing: AtomicBool,
}

impl MockInferenceEngine {
    /// Create a mock producing `dims`-wide hidden states.
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail with [`EmbeddingError::Inference`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn position_row(&self, ids: &[u32], position: usize) -> impl Iterator<Item = f32> {
        let mut hasher = Sha256::new();
        for id in ids {
            hasher.update(id.to_le_bytes());
        }
        hasher.update((position as u64).to_le_bytes());
        let hash = hasher.finalize();
        (0..self.dims).map(move |j| (f32::from(hash[j % hash.len()]) / 127.5) - 1.0)
    }
}

#[async_trait]
impl InferenceEngine for MockInferenceEngine {
    async fn infer(&self, input: &TokenizedSequence) -> Result<HiddenStates> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Inference("mock engine set to fail".into()));
        }
        let rows = input.len();
        let data: Vec<f32> = (0..rows)
            .flat_map(|p| self.position_row(&input.input_ids, p))
            .collect();
        Array2::from_shape_vec((rows, self.dims), data)
            .map_err(|e| EmbeddingError::Internal(format!("mock shape: {e}")))
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{Tokenizer, Vocabulary};
    use std::sync::Arc;

    fn sequence(text: &str) -> TokenizedSequence {
        let vocab = Arc::new(Vocabulary::from_tokens([
            "[PAD]", "[UNK]", "[CLS]", "[SEP]", "hello", "world",
        ]));
        Tokenizer::new(vocab, 16).unwrap().tokenize(text)
    }

    #[tokio::test]
    async fn mock_returns_sequence_by_dims() {
        let engine = MockInferenceEngine::new(24);
        let hidden = engine.infer(&sequence("hello")).await.unwrap();
        assert_eq!(hidden.dim(), (16, 24));
        assert_eq!(engine.dimensions(), Some(24));
    }

    #[tokio::test]
    async fn mock_deterministic_same_input() {
        let engine = MockInferenceEngine::new(8);
        let a = engine.infer(&sequence("hello world")).await.unwrap();
        let b = engine.infer(&sequence("hello world")).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn mock_different_inputs_different_outputs() {
        let engine = MockInferenceEngine::new(8);
        let a = engine.infer(&sequence("hello")).await.unwrap();
        let b = engine.infer(&sequence("world")).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn mock_failing_returns_inference_error() {
        let engine = MockInferenceEngine::new(8);
        engine.set_failing(true);
        let result = engine.infer(&sequence("hello")).await;
        assert!(matches!(result, Err(EmbeddingError::Inference(_))));
    }
}

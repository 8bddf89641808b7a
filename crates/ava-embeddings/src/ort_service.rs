//! ONNX Runtime inference engine (feature-gated behind `ort`).
//!
//! Loads a local sentence-encoder model and returns its first output, the last
//! hidden state `[1, L, D]`, reshaped to `[L, D]`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ndarray::Array2;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::errors::{EmbeddingError, Result};
use crate::service::{HiddenStates, InferenceEngine};
use crate::tokenizer::TokenizedSequence;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// ONNX-based inference engine.
pub struct OnnxInferenceEngine {
    session: Arc<Mutex<ort::session::Session>>,
}

impl OnnxInferenceEngine {
    /// Create a session from a model file.
    ///
    /// Any failure to read or compile the model maps to [`EmbeddingError::Load`].
    pub fn load(path: &Path, intra_threads: usize) -> Result<Self> {
        let session = build_session(path, intra_threads)
            .map_err(|e| EmbeddingError::Load(format!("{}: {e}", path.display())))?;
        info!(model = %path.display(), intra_threads, "ONNX model loaded");
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
        })
    }
}

fn build_session(
    path: &Path,
    intra_threads: usize,
) -> std::result::Result<ort::session::Session, BoxError> {
    let session = ort::session::Session::builder()?
        .with_intra_threads(intra_threads)?
        .with_log_level(ort::logging::LogLevel::Warning)?
        .commit_from_file(path)?;
    Ok(session)
}

#[async_trait]
impl InferenceEngine for OnnxInferenceEngine {
    async fn infer(&self, input: &TokenizedSequence) -> Result<HiddenStates> {
        let session = Arc::clone(&self.session);
        let input = input.clone();
        tokio::task::spawn_blocking(move || {
            let mut session = session.lock();
            run_inference(&mut session, &input)
        })
        .await
        .map_err(|e| EmbeddingError::Internal(format!("join error: {e}")))?
    }

    fn dimensions(&self) -> Option<usize> {
        None
    }
}

/// Map any runtime failure to [`EmbeddingError::Inference`].
fn run_inference(
    session: &mut ort::session::Session,
    input: &TokenizedSequence,
) -> Result<HiddenStates> {
    run_inference_inner(session, input).map_err(|e| EmbeddingError::Inference(e.to_string()))
}

fn run_inference_inner(
    session: &mut ort::session::Session,
    input: &TokenizedSequence,
) -> std::result::Result<HiddenStates, BoxError> {
    let len = input.len();
    if len == 0 {
        return Err("empty sequence".into());
    }

    let input_ids: Vec<i64> = input.input_ids.iter().map(|&id| i64::from(id)).collect();
    let attention_mask: Vec<i64> = input.attention_mask.iter().map(|&m| i64::from(m)).collect();
    let token_type_ids: Vec<i64> = input.token_type_ids.iter().map(|&t| i64::from(t)).collect();

    #[allow(clippy::cast_possible_wrap)]
    let shape = vec![1_i64, len as i64];

    let input_ids_tensor = ort::value::Tensor::from_array((shape.clone(), input_ids))?;
    let attention_mask_tensor = ort::value::Tensor::from_array((shape.clone(), attention_mask))?;
    let token_type_ids_tensor = ort::value::Tensor::from_array((shape, token_type_ids))?;

    let outputs = session.run(ort::inputs![
        "input_ids" => input_ids_tensor,
        "attention_mask" => attention_mask_tensor,
        "token_type_ids" => token_type_ids_tensor,
    ])?;

    let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let dims: Vec<usize> = output_shape.iter().map(|&d| d as usize).collect();
    if dims.len() != 3 || dims[0] != 1 {
        return Err(format!("unexpected output shape: {output_shape:?}").into());
    }
    let (rows, hidden) = (dims[1], dims[2]);
    debug!(rows, hidden, "inference complete");

    let hidden_states = Array2::from_shape_vec((rows, hidden), output_data.to_vec())?;
    Ok(hidden_states)
}

//! Inference engine selection.

use std::sync::Arc;

use anyhow::{Result, bail};
use ava_embeddings::{GeneratorConfig, InferenceEngine, MockInferenceEngine};
use tracing::warn;

/// Pick the engine for a run.
///
/// `mock_dim` selects the deterministic mock; otherwise the configured ONNX
/// model is loaded.
pub fn build_engine(
    config: &GeneratorConfig,
    mock_dim: Option<usize>,
) -> Result<Arc<dyn InferenceEngine>> {
    match mock_dim {
        Some(0) => bail!("--mock-dim must be at least 1"),
        Some(dims) => {
            warn!(dims, "using mock inference engine, vectors are not semantic");
            Ok(Arc::new(MockInferenceEngine::new(dims)))
        }
        None => onnx_engine(config),
    }
}

#[cfg(feature = "ort")]
fn onnx_engine(config: &GeneratorConfig) -> Result<Arc<dyn InferenceEngine>> {
    use anyhow::Context;

    let Some(path) = config.resolved_model_path() else {
        bail!("no model configured (use --model or model.path)");
    };
    let engine = ava_embeddings::OnnxInferenceEngine::load(&path, config.intra_threads)
        .with_context(|| format!("failed to load model: {}", path.display()))?;
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "ort"))]
fn onnx_engine(_config: &GeneratorConfig) -> Result<Arc<dyn InferenceEngine>> {
    bail!("built without ONNX support; rebuild with `--features ort` or pass --mock-dim")
}

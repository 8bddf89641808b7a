//! Intent embedding aggregation.
//!
//! Per example: tokenize → inference → attention-masked mean pooling → L2
//! normalization. Per intent: arithmetic mean of the surviving example
//! vectors, L2-normalized again. Example failures are logged and skipped;
//! an intent with no surviving example is dropped.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::errors::{EmbeddingError, Result};
use crate::normalize::{l2_normalize, mean_pool, mean_vector};
use crate::service::InferenceEngine;
use crate::sources::IntentTable;
use crate::tokenizer::Tokenizer;

/// One generated row: the unit written to both artifacts.
#[derive(Clone, Debug, PartialEq)]
pub struct IntentEmbeddingRecord {
    /// Intent identifier.
    pub intent_id: String,
    /// Unit-length intent vector.
    pub vector: Vec<f32>,
    /// Number of examples the intent was declared with.
    pub example_count: usize,
    /// Model version stamp.
    pub model_version: String,
    /// Locale tag.
    pub locale: String,
}

impl IntentEmbeddingRecord {
    /// Vector width.
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Outcome of embedding one intent's examples.
#[derive(Clone, Debug, PartialEq)]
pub struct IntentEmbedding {
    /// Normalized mean vector, `None` when no example succeeded.
    pub vector: Option<Vec<f32>>,
    /// Examples that contributed to the vector.
    pub embedded: usize,
    /// Examples skipped after a failure.
    pub skipped: usize,
}

/// Final counts of a generation run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Intents present in the merged table.
    pub intents_requested: usize,
    /// Intents that produced a vector.
    pub intents_succeeded: usize,
    /// Ids of intents dropped for lack of any embedded example.
    pub dropped_intents: Vec<String>,
    /// Examples embedded successfully.
    pub examples_embedded: usize,
    /// Examples skipped after an inference failure.
    pub examples_skipped: usize,
}

/// Drives an [`InferenceEngine`] over intents.
pub struct IntentEmbedder {
    tokenizer: Tokenizer,
    engine: Arc<dyn InferenceEngine>,
    concurrency: usize,
}

impl IntentEmbedder {
    /// Create an embedder running one example at a time.
    pub fn new(tokenizer: Tokenizer, engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            tokenizer,
            engine,
            concurrency: 1,
        }
    }

    /// Allow up to `concurrency` in-flight examples per intent.
    ///
    /// Results are consumed in example order whatever the completion order.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Embed a single example phrase.
    pub async fn embed_example(&self, text: &str) -> Result<Vec<f32>> {
        let sequence = self.tokenizer.tokenize(text);
        let hidden = self.engine.infer(&sequence).await?;
        if hidden.nrows() != sequence.len() {
            return Err(EmbeddingError::Inference(format!(
                "engine returned {} positions for a {}-token sequence",
                hidden.nrows(),
                sequence.len()
            )));
        }
        if let Some(expected) = self.engine.dimensions()
            && hidden.ncols() != expected
        {
            return Err(EmbeddingError::Inference(format!(
                "engine declared width {expected} but returned {}",
                hidden.ncols()
            )));
        }
        let mut pooled = mean_pool(hidden.view(), &sequence.attention_mask);
        l2_normalize(&mut pooled);
        Ok(pooled)
    }

    /// Embed all examples of one intent and merge them.
    pub async fn embed_intent(&self, examples: &[String]) -> IntentEmbedding {
        let results: Vec<Result<Vec<f32>>> = stream::iter(examples)
            .map(|example| self.embed_example(example))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(results.len());
        let mut skipped = 0;
        for (example, result) in examples.iter().zip(results) {
            match result {
                Ok(vector) => match vectors.first() {
                    Some(first) if first.len() != vector.len() => {
                        warn!(
                            example = %example,
                            expected = first.len(),
                            actual = vector.len(),
                            "skipping example: dimension mismatch"
                        );
                        skipped += 1;
                    }
                    _ => vectors.push(vector),
                },
                Err(e) => {
                    warn!(example = %example, error = %e, "skipping example: embedding failed");
                    skipped += 1;
                }
            }
        }

        let vector = mean_vector(&vectors).map(|mut mean| {
            l2_normalize(&mut mean);
            mean
        });
        IntentEmbedding {
            vector,
            embedded: vectors.len(),
            skipped,
        }
    }

    /// Embed every intent of a merged table, in table order.
    pub async fn embed_table(
        &self,
        table: &IntentTable,
        model_version: &str,
        locale: &str,
    ) -> (Vec<IntentEmbeddingRecord>, RunReport) {
        let total = table.len();
        let mut records = Vec::with_capacity(total);
        let mut report = RunReport {
            intents_requested: total,
            ..RunReport::default()
        };

        for (n, intent) in table.iter().enumerate() {
            let span = info_span!("intent", id = %intent.id);
            debug!(
                parent: &span,
                index = n + 1,
                total,
                examples = intent.examples.len(),
                "embedding intent"
            );
            let outcome = self.embed_intent(&intent.examples).instrument(span.clone()).await;
            report.examples_embedded += outcome.embedded;
            report.examples_skipped += outcome.skipped;

            match outcome.vector {
                Some(vector) => {
                    report.intents_succeeded += 1;
                    records.push(IntentEmbeddingRecord {
                        intent_id: intent.id.clone(),
                        vector,
                        example_count: intent.examples.len(),
                        model_version: model_version.to_string(),
                        locale: locale.to_string(),
                    });
                }
                None => {
                    warn!(parent: &span, "dropping intent: no example could be embedded");
                    report.dropped_intents.push(intent.id.clone());
                }
            }
        }

        info!(
            requested = report.intents_requested,
            succeeded = report.intents_succeeded,
            examples_skipped = report.examples_skipped,
            "intent embedding complete"
        );
        (records, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::l2_norm;
    use crate::service::{HiddenStates, MockInferenceEngine};
    use crate::tokenizer::{TokenizedSequence, Vocabulary};
    use async_trait::async_trait;
    use ndarray::Array2;
    use std::collections::HashMap;

    /// Returns the same row at every position, keyed by the first real token.
    struct ScriptedEngine {
        rows: HashMap<u32, Vec<f32>>,
        short_output: bool,
        declared: Option<usize>,
    }

    #[async_trait]
    impl InferenceEngine for ScriptedEngine {
        async fn infer(&self, input: &TokenizedSequence) -> Result<HiddenStates> {
            let row = self
                .rows
                .get(&input.input_ids[1])
                .ok_or_else(|| EmbeddingError::Inference("no script for token".into()))?;
            let positions = if self.short_output { 1 } else { input.len() };
            let data: Vec<f32> = (0..positions).flat_map(|_| row.iter().copied()).collect();
            Ok(Array2::from_shape_vec((positions, row.len()), data).unwrap())
        }

        fn dimensions(&self) -> Option<usize> {
            self.declared
        }
    }

    fn tokenizer() -> Tokenizer {
        let vocab = Arc::new(Vocabulary::from_tokens([
            "[PAD]", "[UNK]", "[CLS]", "[SEP]", "east", "north", "wide", "up",
        ]));
        Tokenizer::new(vocab, 8).unwrap()
    }

    fn scripted(short_output: bool) -> Arc<dyn InferenceEngine> {
        scripted_with_width(short_output, None)
    }

    fn scripted_with_width(
        short_output: bool,
        declared: Option<usize>,
    ) -> Arc<dyn InferenceEngine> {
        let rows = HashMap::from([
            (4, vec![1.0, 0.0]),
            (5, vec![0.0, 1.0]),
            (6, vec![0.0, 1.0, 0.0]),
            (7, vec![0.0, 0.0]),
        ]);
        Arc::new(ScriptedEngine {
            rows,
            short_output,
            declared,
        })
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn two_orthogonal_examples_average_to_diagonal() {
        let embedder = IntentEmbedder::new(tokenizer(), scripted(false));
        let outcome = embedder.embed_intent(&strings(&["east", "north"])).await;
        let v = outcome.vector.unwrap();
        assert!((v[0] - 0.707_106_8).abs() < 1e-5);
        assert!((v[1] - 0.707_106_8).abs() < 1e-5);
        assert_eq!(outcome.embedded, 2);
        assert_eq!(outcome.skipped, 0);
    }

    #[tokio::test]
    async fn failing_example_is_skipped() {
        let embedder = IntentEmbedder::new(tokenizer(), scripted(false));
        let outcome = embedder.embed_intent(&strings(&["east", "unknown words"])).await;
        assert_eq!(outcome.vector.unwrap(), vec![1.0, 0.0]);
        assert_eq!(outcome.embedded, 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_skipped() {
        let embedder = IntentEmbedder::new(tokenizer(), scripted(false));
        let outcome = embedder.embed_intent(&strings(&["east", "wide"])).await;
        assert_eq!(outcome.vector.unwrap().len(), 2);
        assert_eq!(outcome.skipped, 1);
    }

    #[tokio::test]
    async fn no_successful_example_is_absent() {
        let embedder = IntentEmbedder::new(tokenizer(), scripted(false));
        let outcome = embedder.embed_intent(&strings(&["nothing here"])).await;
        assert!(outcome.vector.is_none());
        assert_eq!(outcome.skipped, 1);

        let empty = embedder.embed_intent(&[]).await;
        assert!(empty.vector.is_none());
        assert_eq!(empty.skipped, 0);
    }

    #[tokio::test]
    async fn zero_hidden_states_stay_zero() {
        let embedder = IntentEmbedder::new(tokenizer(), scripted(false));
        let v = embedder.embed_example("up").await.unwrap();
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn short_engine_output_is_inference_error() {
        let embedder = IntentEmbedder::new(tokenizer(), scripted(true));
        let result = embedder.embed_example("east").await;
        assert!(matches!(result, Err(EmbeddingError::Inference(_))));
    }

    #[tokio::test]
    async fn output_wider_than_declared_is_inference_error() {
        let embedder = IntentEmbedder::new(tokenizer(), scripted_with_width(false, Some(2)));
        assert_eq!(embedder.embed_example("east").await.unwrap().len(), 2);
        let result = embedder.embed_example("wide").await;
        assert!(matches!(result, Err(EmbeddingError::Inference(_))));

        let outcome = embedder.embed_intent(&strings(&["wide", "east"])).await;
        assert_eq!(outcome.vector.unwrap(), vec![1.0, 0.0]);
        assert_eq!(outcome.skipped, 1);
    }

    #[tokio::test]
    async fn embeddings_are_unit_length() {
        let embedder = IntentEmbedder::new(tokenizer(), Arc::new(MockInferenceEngine::new(32)));
        let outcome = embedder
            .embed_intent(&strings(&["east wide", "north up", "anything at all"]))
            .await;
        let v = outcome.vector.unwrap();
        assert!((l2_norm(&v) - 1.0).abs() < 1e-5);
        let single = embedder.embed_example("east").await.unwrap();
        assert!((l2_norm(&single) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn concurrency_does_not_change_result() {
        let engine: Arc<dyn InferenceEngine> = Arc::new(MockInferenceEngine::new(16));
        let examples = strings(&["east", "north", "wide up", "up", "east north wide"]);
        let serial = IntentEmbedder::new(tokenizer(), engine.clone())
            .embed_intent(&examples)
            .await;
        let parallel = IntentEmbedder::new(tokenizer(), engine)
            .with_concurrency(4)
            .embed_intent(&examples)
            .await;
        assert_eq!(serial, parallel);
    }

    #[tokio::test]
    async fn embed_table_reports_counts_and_keeps_order() {
        let mut table = IntentTable::new();
        table.insert("go_north", ["north", "north east"]);
        table.insert("broken", ["nothing"]);
        table.insert("go_east", ["east", "bogus"]);

        let embedder = IntentEmbedder::new(tokenizer(), scripted(false));
        let (records, report) = embedder.embed_table(&table, "m1", "en-US").await;

        let ids: Vec<&str> = records.iter().map(|r| r.intent_id.as_str()).collect();
        assert_eq!(ids, vec!["go_north", "go_east"]);
        assert_eq!(records[1].example_count, 2);
        assert_eq!(records[1].model_version, "m1");
        assert_eq!(records[1].locale, "en-US");
        assert_eq!(records[0].dimension(), 2);

        assert_eq!(
            report,
            RunReport {
                intents_requested: 3,
                intents_succeeded: 2,
                dropped_intents: vec!["broken".to_string()],
                examples_embedded: 3,
                examples_skipped: 2,
            }
        );
    }
}

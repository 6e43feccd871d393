//! Classifier contract and backend-independent helpers.
//!
//! Every image-labeling backend implements [`Classifier`]. Callers depend
//! only on [`Classifier::classify`], never on which backend is behind it.
//! Concrete backends (fixed-vocabulary ONNX model, cloud label detector)
//! live in the `lost-found` app crate.
//!
//! A classifier is constructed once, then shared read-only (`Arc`) across
//! any number of in-flight classifications.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use crate::error::{LostFoundError, Result};
use crate::models::LabelPrediction;
use crate::normalize::normalize_label;

/// An image-labeling backend.
///
/// # Contract
///
/// - Returns predictions ordered by confidence, descending.
/// - An empty vector means "no labels detected"; it is not an error.
/// - [`LostFoundError::ModelUnavailable`] means the backend cannot run at
///   all; callers treat it as "no labels" rather than a crash.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Short backend identifier used in logs (e.g. `"fixed"`, `"open"`).
    fn name(&self) -> &str;

    /// Label an encoded image (JPEG, PNG, ...).
    async fn classify(&self, image: &[u8]) -> Result<Vec<LabelPrediction>>;
}

/// A classifier that is never available.
///
/// Used when `classifier.mode = "disabled"`. Submissions still succeed with
/// an empty label set; image search reports "no labels detected".
pub struct DisabledClassifier;

#[async_trait]
impl Classifier for DisabledClassifier {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn classify(&self, _image: &[u8]) -> Result<Vec<LabelPrediction>> {
        Err(LostFoundError::ModelUnavailable(
            "classifier is disabled".to_string(),
        ))
    }
}

/// Pick the top `k` scores above `min_confidence` and pair them with
/// their vocabulary entries.
///
/// Ties are broken by lower class index so the result is deterministic.
/// Scores beyond the vocabulary length are ignored.
pub fn rank_scores(
    scores: &[f32],
    vocabulary: &[String],
    k: usize,
    min_confidence: f32,
) -> Vec<LabelPrediction> {
    let mut indexed: Vec<(usize, f32)> = scores
        .iter()
        .copied()
        .enumerate()
        .take(vocabulary.len())
        .filter(|(_, s)| s.is_finite() && *s > min_confidence)
        .collect();

    indexed.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    indexed.truncate(k);

    indexed
        .into_iter()
        .map(|(i, s)| LabelPrediction::new(vocabulary[i].clone(), s))
        .collect()
}

/// Sort predictions by confidence (descending, stable) and keep the first
/// `k` that clear `min_confidence`.
pub fn top_k(
    mut predictions: Vec<LabelPrediction>,
    k: usize,
    min_confidence: f32,
) -> Vec<LabelPrediction> {
    let clears = |p: &LabelPrediction| p.confidence.is_finite() && p.confidence > min_confidence;
    predictions.retain(clears);
    predictions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
    predictions.truncate(k);
    predictions
}

/// Runs several backends and combines their output.
///
/// Every backend is consulted before returning. Predictions are merged,
/// sorted by confidence, and de-duplicated on their normalized text
/// (the highest-confidence occurrence wins). The composite only fails when
/// every backend fails, in which case the first error is returned.
pub struct CompositeClassifier {
    backends: Vec<Arc<dyn Classifier>>,
}

impl CompositeClassifier {
    pub fn new(backends: Vec<Arc<dyn Classifier>>) -> Self {
        Self { backends }
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[async_trait]
impl Classifier for CompositeClassifier {
    fn name(&self) -> &str {
        "composite"
    }

    async fn classify(&self, image: &[u8]) -> Result<Vec<LabelPrediction>> {
        if self.backends.is_empty() {
            return Err(LostFoundError::ModelUnavailable(
                "no classifier backends configured".to_string(),
            ));
        }

        let mut combined = Vec::new();
        let mut first_err = None;
        let mut succeeded = 0usize;

        let outcomes = join_all(self.backends.iter().map(|b| b.classify(image))).await;

        for (backend, outcome) in self.backends.iter().zip(outcomes) {
            match outcome {
                Ok(preds) => {
                    succeeded += 1;
                    combined.extend(preds);
                }
                Err(e) => {
                    tracing::warn!(
                        backend = backend.name(),
                        error = %e,
                        "classifier backend failed"
                    );
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }

        if succeeded == 0 {
            if let Some(e) = first_err {
                return Err(e);
            }
        }

        combined.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });

        let mut seen = HashSet::new();
        combined.retain(|p| seen.insert(normalize_label(&p.text)));
        Ok(combined)
    }
}

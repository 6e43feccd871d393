//! Classifier backends and the factory that assembles them from config.
//!
//! | Mode        | Backends                                      |
//! |-------------|-----------------------------------------------|
//! | `disabled`  | none; every image reports `ModelUnavailable`  |
//! | `fixed`     | ONNX model over a closed label vocabulary     |
//! | `open`      | Cloud Vision label detection                  |
//! | `composite` | both, merged by confidence                    |
//!
//! Loading failures are logged and surface as `ModelUnavailable` at
//! classification time, so the rest of the app keeps working without labels.

pub mod fixed;
#[cfg(feature = "tract")]
pub mod local_tract;
pub mod open;

use anyhow::Result;
use std::sync::Arc;

use lost_found_core::classifier::{Classifier, CompositeClassifier, DisabledClassifier};

use crate::config::{ClassifierConfig, FixedClassifierConfig, OpenClassifierConfig};
use fixed::{FixedVocabularyClassifier, ScoreModel, Vocabulary};
use open::{CloudVisionDetector, OpenVocabularyClassifier};

pub fn create_classifier(config: &ClassifierConfig) -> Result<Arc<dyn Classifier>> {
    let classifier: Arc<dyn Classifier> = match config.mode.as_str() {
        "disabled" => Arc::new(DisabledClassifier),
        "fixed" => build_fixed(required_fixed(config)?),
        "open" => build_open(&config.open.clone().unwrap_or_default())?,
        "composite" => Arc::new(CompositeClassifier::new(vec![
            build_fixed(required_fixed(config)?),
            build_open(&config.open.clone().unwrap_or_default())?,
        ])),
        other => anyhow::bail!("Unknown classifier mode: {}", other),
    };
    tracing::debug!(mode = %config.mode, backend = classifier.name(), "classifier ready");
    Ok(classifier)
}

fn required_fixed(config: &ClassifierConfig) -> Result<&FixedClassifierConfig> {
    config.fixed.as_ref().ok_or_else(|| {
        anyhow::anyhow!(
            "[classifier.fixed] is required when mode is '{}'",
            config.mode
        )
    })
}

fn build_fixed(config: &FixedClassifierConfig) -> Arc<dyn Classifier> {
    let vocabulary = match Vocabulary::load(&config.labels_path) {
        Ok(v) => {
            if v.is_empty() {
                tracing::warn!(path = %config.labels_path.display(), "label vocabulary is empty");
            }
            v
        }
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "label vocabulary unavailable");
            Vocabulary::default()
        }
    };

    let model = load_model(config);

    Arc::new(
        FixedVocabularyClassifier::new(model, vocabulary, config.input_size)
            .with_top_k(config.top_k)
            .with_min_confidence(config.min_confidence)
            .with_softmax(config.softmax),
    )
}

#[cfg(feature = "tract")]
fn load_model(config: &FixedClassifierConfig) -> Option<Arc<dyn ScoreModel>> {
    match local_tract::TractModel::load(&config.model_path, config.input_size) {
        Ok(model) => {
            tracing::info!(path = %config.model_path.display(), "classification model loaded");
            let model: Arc<dyn ScoreModel> = Arc::new(model);
            Some(model)
        }
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "classification model unavailable");
            None
        }
    }
}

#[cfg(not(feature = "tract"))]
fn load_model(_config: &FixedClassifierConfig) -> Option<Arc<dyn ScoreModel>> {
    tracing::warn!("built without the `tract` feature; fixed-vocabulary classification disabled");
    None
}

fn build_open(config: &OpenClassifierConfig) -> Result<Arc<dyn Classifier>> {
    let detector = CloudVisionDetector::new(config)?;
    Ok(Arc::new(
        OpenVocabularyClassifier::new(detector)
            .with_top_k(config.top_k)
            .with_min_confidence(config.min_confidence),
    ))
}

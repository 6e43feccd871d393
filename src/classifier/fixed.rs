//! Fixed-vocabulary classifier: a numeric model over a closed label set.
//!
//! The vocabulary and model are loaded once at startup and shared
//! read-only. Each classification decodes the photo, resizes it to the
//! model's square input, scales channels to `[0, 1]`, and runs inference
//! on a blocking thread.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use image::imageops::FilterType;
use ndarray::Array4;

use lost_found_core::classifier::{rank_scores, Classifier};
use lost_found_core::models::LabelPrediction;
use lost_found_core::{LostFoundError, Result};

/// A loaded model that maps a `[1, H, W, 3]` tensor to one score per class.
pub trait ScoreModel: Send + Sync {
    fn scores(&self, input: Array4<f32>) -> AnyResult<Vec<f32>>;
}

/// Closed label vocabulary, one entry per model output class.
///
/// Entries are kept raw (`"3 backpack"`); normalization happens downstream.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    labels: Vec<String>,
}

impl Vocabulary {
    /// Parse newline-delimited labels, skipping blank lines.
    pub fn from_lines(text: &str) -> Self {
        Self {
            labels: text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn load(path: &Path) -> AnyResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read labels file: {}", path.display()))?;
        Ok(Self::from_lines(&text))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

pub struct FixedVocabularyClassifier {
    model: Option<Arc<dyn ScoreModel>>,
    vocabulary: Arc<Vocabulary>,
    input_size: u32,
    top_k: usize,
    min_confidence: f32,
    softmax: bool,
}

impl FixedVocabularyClassifier {
    /// `model` may be `None` when loading failed; classification then
    /// reports `ModelUnavailable` instead of crashing.
    pub fn new(
        model: Option<Arc<dyn ScoreModel>>,
        vocabulary: Vocabulary,
        input_size: u32,
    ) -> Self {
        Self {
            model,
            vocabulary: Arc::new(vocabulary),
            input_size,
            top_k: 1,
            min_confidence: 0.0,
            softmax: false,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Apply softmax to raw model outputs (for models that emit logits).
    pub fn with_softmax(mut self, softmax: bool) -> Self {
        self.softmax = softmax;
        self
    }
}

#[async_trait]
impl Classifier for FixedVocabularyClassifier {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn classify(&self, image: &[u8]) -> Result<Vec<LabelPrediction>> {
        if self.vocabulary.is_empty() {
            return Err(LostFoundError::ModelUnavailable(
                "label vocabulary is empty".to_string(),
            ));
        }
        let model = self.model.clone().ok_or_else(|| {
            LostFoundError::ModelUnavailable("classification model is not loaded".to_string())
        })?;

        let bytes = image.to_vec();
        let size = self.input_size;
        let mut scores = tokio::task::spawn_blocking(move || {
            let input = preprocess(&bytes, size)?;
            model
                .scores(input)
                .map_err(|e| LostFoundError::Classification(format!("inference: {}", e)))
        })
        .await
        .map_err(|e| LostFoundError::Classification(format!("inference task: {}", e)))??;

        if scores.len() != self.vocabulary.len() {
            return Err(LostFoundError::Classification(format!(
                "model produced {} scores for a vocabulary of {} labels",
                scores.len(),
                self.vocabulary.len()
            )));
        }
        if self.softmax {
            softmax_in_place(&mut scores);
        }

        Ok(rank_scores(
            &scores,
            self.vocabulary.labels(),
            self.top_k,
            self.min_confidence,
        ))
    }
}

/// Decode, resize to `size`×`size` (bilinear), and lay out as
/// `[1, size, size, 3]` RGB with channels scaled to `[0, 1]`.
pub fn preprocess(image: &[u8], size: u32) -> Result<Array4<f32>> {
    let decoded = image::load_from_memory(image)
        .map_err(|e| LostFoundError::Classification(format!("decode image: {}", e)))?;
    let rgb = decoded
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgb8();

    let side = size as usize;
    Ok(Array4::from_shape_fn((1, side, side, 3), |(_, y, x, c)| {
        rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    }))
}

fn softmax_in_place(scores: &mut [f32]) {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0f32;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    if sum > 0.0 {
        for s in scores.iter_mut() {
            *s /= sum;
        }
    }
}

//! Open-vocabulary classifier backed by a label-detection service.
//!
//! The detector returns free-text labels with scores; the classifier keeps
//! the top `k` above the confidence floor. The default detector is Google
//! Cloud Vision `LABEL_DETECTION`.
//!
//! Retry strategy for the HTTP detector:
//! - HTTP 429 or 5xx → retry with exponential backoff
//! - HTTP 4xx (not 429) → fail immediately
//! - Network error → retry

use anyhow::{bail, Result as AnyResult};
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

use lost_found_core::classifier::{top_k, Classifier};
use lost_found_core::models::LabelPrediction;
use lost_found_core::{LostFoundError, Result};

use crate::config::OpenClassifierConfig;

/// Anything that turns photo bytes into scored free-text labels.
#[async_trait]
pub trait LabelDetector: Send + Sync {
    fn name(&self) -> &str;

    /// Errors that are a [`LostFoundError`] pass through unchanged; any
    /// other failure is reported as a classification error.
    async fn detect(&self, image: &[u8]) -> AnyResult<Vec<LabelPrediction>>;
}

pub struct OpenVocabularyClassifier<D> {
    detector: D,
    top_k: usize,
    min_confidence: f32,
}

impl<D: LabelDetector> OpenVocabularyClassifier<D> {
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            top_k: 2,
            min_confidence: 0.0,
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
}

#[async_trait]
impl<D: LabelDetector> Classifier for OpenVocabularyClassifier<D> {
    fn name(&self) -> &str {
        self.detector.name()
    }

    async fn classify(&self, image: &[u8]) -> Result<Vec<LabelPrediction>> {
        let detected = self
            .detector
            .detect(image)
            .await
            .map_err(|e| match e.downcast::<LostFoundError>() {
                Ok(typed) => typed,
                Err(other) => LostFoundError::Classification(format!("{:#}", other)),
            })?;
        Ok(top_k(detected, self.top_k, self.min_confidence))
    }
}

/// Google Cloud Vision `images:annotate` client.
pub struct CloudVisionDetector {
    client: reqwest::Client,
    endpoint: String,
    api_key_env: String,
    max_results: usize,
    max_retries: u32,
}

impl CloudVisionDetector {
    pub fn new(config: &OpenClassifierConfig) -> AnyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key_env: config.api_key_env.clone(),
            max_results: config.top_k.max(10),
            max_retries: config.max_retries,
        })
    }

    fn request_body(&self, image: &[u8]) -> serde_json::Value {
        serde_json::json!({
            "requests": [{
                "image": {
                    "content": base64::engine::general_purpose::STANDARD.encode(image),
                },
                "features": [{
                    "type": "LABEL_DETECTION",
                    "maxResults": self.max_results,
                }],
            }],
        })
    }
}

#[async_trait]
impl LabelDetector for CloudVisionDetector {
    fn name(&self) -> &str {
        "cloud-vision"
    }

    async fn detect(&self, image: &[u8]) -> AnyResult<Vec<LabelPrediction>> {
        let api_key = std::env::var(&self.api_key_env).map_err(|_| {
            LostFoundError::ModelUnavailable(format!("{} not set", self.api_key_env))
        })?;

        let body = self.request_body(image);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .query(&[("key", api_key.as_str())])
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_annotate_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        tracing::warn!(%status, attempt, "label detection retryable error");
                        last_err = Some(anyhow::anyhow!(
                            "Vision API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Vision API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Label detection failed after retries")))
    }
}

/// Extract `responses[0].labelAnnotations[].{description, score}`.
///
/// The service omits `labelAnnotations` when it finds nothing, which is an
/// empty result rather than an error. A per-image `error` object is an error.
pub fn parse_annotate_response(json: &serde_json::Value) -> AnyResult<Vec<LabelPrediction>> {
    let first = json
        .get("responses")
        .and_then(|r| r.as_array())
        .and_then(|r| r.first())
        .ok_or_else(|| anyhow::anyhow!("Invalid Vision response: missing responses"))?;

    if let Some(err) = first.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        bail!("Vision API image error: {}", message);
    }

    let Some(annotations) = first.get("labelAnnotations").and_then(|a| a.as_array()) else {
        return Ok(Vec::new());
    };

    let mut labels = Vec::with_capacity(annotations.len());
    for annotation in annotations {
        let description = annotation
            .get("description")
            .and_then(|d| d.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid Vision response: label without description"))?;
        let score = annotation
            .get("score")
            .and_then(|s| s.as_f64())
            .unwrap_or(0.0) as f32;
        labels.push(LabelPrediction::new(description, score));
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Canned(AnyResult<Vec<LabelPrediction>>);

    #[async_trait]
    impl LabelDetector for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn detect(&self, _image: &[u8]) -> AnyResult<Vec<LabelPrediction>> {
            match &self.0 {
                Ok(labels) => Ok(labels.clone()),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }
    }

    #[test]
    fn test_parse_labels() {
        let body = json!({
            "responses": [{
                "labelAnnotations": [
                    {"mid": "/m/01", "description": "Bag", "score": 0.97},
                    {"mid": "/m/02", "description": "Blue", "score": 0.88}
                ]
            }]
        });
        let labels = parse_annotate_response(&body).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].text, "Bag");
        assert!((labels[1].confidence - 0.88).abs() < 1e-6);
    }

    #[test]
    fn test_parse_no_annotations_is_empty() {
        let labels = parse_annotate_response(&json!({"responses": [{}]})).unwrap();
        assert!(labels.is_empty());
    }

    #[test]
    fn test_parse_image_error() {
        let body = json!({"responses": [{"error": {"code": 3, "message": "Bad image data."}}]});
        let err = parse_annotate_response(&body).unwrap_err();
        assert!(err.to_string().contains("Bad image data."));
    }

    #[test]
    fn test_parse_missing_responses() {
        assert!(parse_annotate_response(&json!({})).is_err());
    }

    #[tokio::test]
    async fn test_keeps_top_two() {
        let classifier = OpenVocabularyClassifier::new(Canned(Ok(vec![
            LabelPrediction::new("Strap", 0.41),
            LabelPrediction::new("Bag", 0.97),
            LabelPrediction::new("Blue", 0.88),
        ])));
        let labels = classifier.classify(b"img").await.unwrap();
        let texts: Vec<_> = labels.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["Bag", "Blue"]);
    }

    #[tokio::test]
    async fn test_detector_failure_is_classification_error() {
        let classifier = OpenVocabularyClassifier::new(Canned(Err(anyhow::anyhow!("boom"))));
        let err = classifier.classify(b"img").await.unwrap_err();
        assert!(err.is_classification_failure());
        assert!(matches!(err, LostFoundError::Classification(_)));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_unavailable() {
        let config = OpenClassifierConfig {
            api_key_env: "LNF_TEST_VISION_KEY_NEVER_SET".to_string(),
            ..OpenClassifierConfig::default()
        };
        let classifier = OpenVocabularyClassifier::new(CloudVisionDetector::new(&config).unwrap());
        let err = classifier.classify(b"img").await.unwrap_err();
        assert!(matches!(err, LostFoundError::ModelUnavailable(_)));
    }

    #[test]
    fn test_request_body_shape() {
        let detector = CloudVisionDetector::new(&OpenClassifierConfig::default()).unwrap();
        let body = detector.request_body(b"abc");
        assert_eq!(body["requests"][0]["image"]["content"], "YWJj");
        assert_eq!(body["requests"][0]["features"][0]["type"], "LABEL_DETECTION");
        assert_eq!(body["requests"][0]["features"][0]["maxResults"], 10);
    }
}

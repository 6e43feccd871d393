//! Catalogue writer: classify, upload, and persist a new item.
//!
//! Steps run strictly in order; each one only starts after the previous
//! one finished:
//!
//! 1. Validate name, category, and image.
//! 2. Classify and normalize labels, appending any caller-supplied labels.
//!    A classifier failure is logged and yields an empty label set.
//! 3. Upload the photo under a time-unique key. Failure aborts with
//!    [`LostFoundError::UploadFailed`]; nothing is persisted.
//! 4. Persist the item. Failure returns [`LostFoundError::SaveFailed`];
//!    the uploaded blob is left in place.

use std::sync::Arc;

use chrono::Utc;

use crate::classifier::Classifier;
use crate::error::{LostFoundError, Result};
use crate::models::{Item, StoredItem};
use crate::normalize::{merge_labels, normalize_predictions, normalize_query};
use crate::store::{BlobStore, DocumentStore};

/// Default blob key prefix for uploaded photos.
pub const DEFAULT_KEY_PREFIX: &str = "uploads/";

/// User input for a new catalogue entry.
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub name: String,
    pub category: String,
    /// Encoded photo bytes. Required.
    pub image: Option<Vec<u8>>,
    /// Extra labels from a separate detector pass or typed by the user.
    pub user_labels: Vec<String>,
}

pub struct CatalogueWriter {
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    key_prefix: String,
}

impl CatalogueWriter {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            classifier,
            store,
            blobs,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Create and persist a new item. See the module docs for step order
    /// and failure handling.
    pub async fn submit(&self, req: SubmitRequest) -> Result<StoredItem> {
        let image = validate(&req)?;

        let labels = self.labels_for(image, &req.user_labels).await;

        let key = blob_key(&self.key_prefix, image);
        let url = self.blobs.put(&key, image).await.map_err(|e| {
            tracing::warn!(key = %key, error = %e, "photo upload failed");
            LostFoundError::UploadFailed(e.to_string())
        })?;

        let item = Item::new(&req.name, &req.category, url.clone(), labels);
        let doc_key = self.store.add(&item).await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "item save failed after upload; blob orphaned");
            LostFoundError::SaveFailed {
                url: url.clone(),
                reason: e.to_string(),
            }
        })?;

        tracing::info!(key = %doc_key, name = %item.name, labels = ?item.labels, "item catalogued");
        Ok(StoredItem { key: doc_key, item })
    }

    async fn labels_for(&self, image: &[u8], user_labels: &[String]) -> Vec<String> {
        let predicted = match self.classifier.classify(image).await {
            Ok(preds) => normalize_predictions(&preds),
            Err(e) => {
                tracing::warn!(
                    classifier = self.classifier.name(),
                    error = %e,
                    "classification failed; continuing without labels"
                );
                Vec::new()
            }
        };
        merge_labels(&predicted, user_labels)
    }
}

fn validate(req: &SubmitRequest) -> Result<&[u8]> {
    if normalize_query(&req.name).is_empty() {
        return Err(LostFoundError::Validation("name is required".to_string()));
    }
    if normalize_query(&req.category).is_empty() {
        return Err(LostFoundError::Validation("category is required".to_string()));
    }
    match req.image.as_deref() {
        Some(bytes) if !bytes.is_empty() => Ok(bytes),
        _ => Err(LostFoundError::Validation("an image is required".to_string())),
    }
}

/// `<prefix><unix millis>-<8 hex chars>.<ext>`
///
/// The random suffix keeps keys unique when two uploads land in the same
/// millisecond.
pub fn blob_key(prefix: &str, image: &[u8]) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}-{}.{}", prefix, millis, &suffix[..8], image_extension(image))
}

/// File extension for an encoded image, sniffed from its magic bytes.
pub fn image_extension(image: &[u8]) -> &'static str {
    match image::guess_format(image) {
        Ok(format) => format.extensions_str().first().copied().unwrap_or("jpg"),
        Err(_) => "jpg",
    }
}

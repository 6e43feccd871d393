//! Error taxonomy for the search and catalogue pipeline.
//!
//! Adapters (stores, detectors, models) report failures as `anyhow::Error`;
//! the pipeline folds them into one of these variants at the boundary so
//! callers can branch on the outcome.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LostFoundError {
    /// Classifier backend missing, empty, or not configured.
    #[error("Classifier model unavailable: {0}")]
    ModelUnavailable(String),

    /// Backend was present but classification failed.
    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Search failed: {0}")]
    SearchFailed(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// Persisting the item failed after the photo was uploaded to `url`.
    #[error("Save failed (uploaded blob {url} is orphaned): {reason}")]
    SaveFailed { url: String, reason: String },

    #[error("Cancelled by user")]
    UserCancelled,

    #[error("Operation cancelled")]
    Cancelled,
}

impl LostFoundError {
    /// True when the user can fix the problem by changing their input.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            LostFoundError::InvalidQuery(_)
                | LostFoundError::Validation(_)
                | LostFoundError::UserCancelled
        )
    }

    /// True for failures the classifier pipeline absorbs as "no labels".
    pub fn is_classification_failure(&self) -> bool {
        matches!(
            self,
            LostFoundError::ModelUnavailable(_) | LostFoundError::Classification(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LostFoundError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_correctable() {
        assert!(LostFoundError::InvalidQuery("empty".into()).is_user_correctable());
        assert!(LostFoundError::Validation("name".into()).is_user_correctable());
        assert!(LostFoundError::UserCancelled.is_user_correctable());
        assert!(!LostFoundError::SearchFailed("down".into()).is_user_correctable());
        assert!(!LostFoundError::UploadFailed("net".into()).is_user_correctable());
    }

    #[test]
    fn test_save_failed_mentions_orphan() {
        let err = LostFoundError::SaveFailed {
            url: "file:///tmp/uploads/1.jpg".into(),
            reason: "disk full".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("orphaned"));
        assert!(msg.contains("file:///tmp/uploads/1.jpg"));
    }
}

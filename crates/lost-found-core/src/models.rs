//! Core data models that flow through the search and catalogue pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::normalize_query;

/// A catalogued lost-and-found entry.
///
/// Serialized with the same field names the document store uses
/// (`name`, `category`, `imageUrl`, `dateAdded`, `labels`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Lowercased, trimmed item name.
    pub name: String,
    /// Lowercased, trimmed category.
    pub category: String,
    /// Retrieval URL returned by the blob store.
    pub image_url: String,
    /// Creation time; never changes after construction.
    pub date_added: DateTime<Utc>,
    /// Normalized labels. A set, ordered by insertion for display.
    pub labels: Vec<String>,
}

impl Item {
    /// Build a new item stamped with the current time.
    ///
    /// `name` and `category` are normalized here; `labels` are expected to
    /// already be normalized and de-duplicated.
    pub fn new(name: &str, category: &str, image_url: String, labels: Vec<String>) -> Self {
        Self::with_date(name, category, image_url, Utc::now(), labels)
    }

    pub fn with_date(
        name: &str,
        category: &str,
        image_url: String,
        date_added: DateTime<Utc>,
        labels: Vec<String>,
    ) -> Self {
        Self {
            name: normalize_query(name),
            category: normalize_query(category),
            image_url,
            date_added,
            labels,
        }
    }
}

/// An [`Item`] together with its store-assigned document key.
///
/// The key is the identity used for de-duplication when merging results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    pub key: String,
    #[serde(flatten)]
    pub item: Item,
}

/// A single label produced by a classifier backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelPrediction {
    /// Raw label text, possibly carrying a numeric class-index prefix.
    pub text: String,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f32,
}

impl LabelPrediction {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Input to the query planner: either free text or a set of labels.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchQuery {
    Text(String),
    Labels(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_new_normalizes_name_and_category() {
        let item = Item::new(
            "  Blue Backpack ",
            "Bags",
            "file:///x.jpg".into(),
            vec!["backpack".into()],
        );
        assert_eq!(item.name, "blue backpack");
        assert_eq!(item.category, "bags");
        assert_eq!(item.labels, vec!["backpack".to_string()]);
    }

    #[test]
    fn test_item_serializes_store_field_names() {
        let item = Item::new("wallet", "accessories", "u".into(), vec![]);
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("imageUrl").is_some());
        assert!(json.get("dateAdded").is_some());
        assert!(json.get("image_url").is_none());
    }

    #[test]
    fn test_stored_item_flattens_item() {
        let stored = StoredItem {
            key: "k1".into(),
            item: Item::new("keys", "misc", "u".into(), vec!["key".into()]),
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["key"], "k1");
        assert_eq!(json["name"], "keys");
    }
}

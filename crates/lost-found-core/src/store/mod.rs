//! Storage contracts for the external document and blob stores.
//!
//! [`DocumentStore`] holds catalogued items and answers the two query
//! shapes the planner needs: a lexicographic range on a scalar field and
//! array membership on `labels`. [`BlobStore`] holds uploaded photos.
//!
//! Implementations must be `Send + Sync`. Retry policy, if any, belongs to
//! the implementation; the pipeline never retries.

pub mod memory;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Item, StoredItem};

/// Name of the collection every catalogued item lives in.
pub const ITEMS_COLLECTION: &str = "items";

/// Default cap on `array-contains-any` operands.
pub const DEFAULT_MAX_ANY_OPERANDS: usize = 10;

/// Sentinel appended to a prefix to form the inclusive upper bound of a
/// "starts with" range. Sorts after every valid character.
pub const PREFIX_SENTINEL: char = char::MAX;

/// Scalar item fields that support range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarField {
    Name,
    Category,
}

impl ScalarField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarField::Name => "name",
            ScalarField::Category => "category",
        }
    }

    /// Read this field from an item.
    pub fn value<'a>(&self, item: &'a Item) -> &'a str {
        match self {
            ScalarField::Name => &item.name,
            ScalarField::Category => &item.category,
        }
    }
}

/// A single store query.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `lower <= field <= upper`, compared by code point.
    Range {
        field: ScalarField,
        lower: String,
        upper: String,
    },
    /// `labels` contains `value`.
    ArrayContains { value: String },
    /// `labels` contains at least one of `values`.
    ArrayContainsAny { values: Vec<String> },
}

impl Predicate {
    /// "Starts with" expressed as a range: `[prefix, prefix + sentinel]`.
    pub fn prefix(field: ScalarField, prefix: &str) -> Self {
        let mut upper = String::with_capacity(prefix.len() + 4);
        upper.push_str(prefix);
        upper.push(PREFIX_SENTINEL);
        Predicate::Range {
            field,
            lower: prefix.to_string(),
            upper,
        }
    }

    /// Evaluate the predicate against an item.
    ///
    /// Reference semantics for in-memory stores and tests.
    pub fn matches(&self, item: &Item) -> bool {
        match self {
            Predicate::Range {
                field,
                lower,
                upper,
            } => {
                let v = field.value(item);
                v >= lower.as_str() && v <= upper.as_str()
            }
            Predicate::ArrayContains { value } => item.labels.iter().any(|l| l == value),
            Predicate::ArrayContainsAny { values } => {
                item.labels.iter().any(|l| values.contains(l))
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Range { field, lower, .. } => {
                write!(f, "{} starts with {:?}", field.as_str(), lower)
            }
            Predicate::ArrayContains { value } => write!(f, "labels contains {:?}", value),
            Predicate::ArrayContainsAny { values } => {
                write!(f, "labels contains any of {:?}", values)
            }
        }
    }
}

/// Abstract document store holding the `items` collection.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`query`](DocumentStore::query) | Run one predicate, results in store order |
/// | [`add`](DocumentStore::add) | Persist a new item, returning its key |
/// | [`max_any_operands`](DocumentStore::max_any_operands) | Operand cap for `ArrayContainsAny` |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run a single predicate against the `items` collection.
    ///
    /// Result order is whatever the store returns; callers must not assume
    /// any particular tie-break.
    async fn query(&self, predicate: &Predicate) -> Result<Vec<StoredItem>>;

    /// Persist a new item and return its store-assigned key.
    async fn add(&self, item: &Item) -> Result<String>;

    /// Maximum number of values accepted by [`Predicate::ArrayContainsAny`].
    fn max_any_operands(&self) -> usize {
        DEFAULT_MAX_ANY_OPERANDS
    }
}

/// Abstract blob store for uploaded photos.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key` and return a retrieval URL.
    ///
    /// Keys are unique per upload; implementations reject an existing key.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, category: &str, labels: &[&str]) -> Item {
        Item::new(
            name,
            category,
            String::new(),
            labels.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_prefix_range_matches_starts_with() {
        let p = Predicate::prefix(ScalarField::Name, "bag");
        assert!(p.matches(&item("bag", "x", &[])));
        assert!(p.matches(&item("bags of rice", "x", &[])));
        assert!(p.matches(&item("bag\u{fff0}", "x", &[])));
        assert!(!p.matches(&item("blue bag", "x", &[])));
        assert!(!p.matches(&item("ba", "x", &[])));
        assert!(!p.matches(&item("bah", "x", &[])));
    }

    #[test]
    fn test_prefix_range_on_category() {
        let p = Predicate::prefix(ScalarField::Category, "bag");
        assert!(p.matches(&item("x", "bags", &[])));
        assert!(!p.matches(&item("bags", "x", &[])));
    }

    #[test]
    fn test_array_contains_exact() {
        let p = Predicate::ArrayContains {
            value: "bag".into(),
        };
        assert!(p.matches(&item("x", "y", &["phone", "bag"])));
        assert!(!p.matches(&item("x", "y", &["bags"])));
    }

    #[test]
    fn test_array_contains_any_is_or() {
        let p = Predicate::ArrayContainsAny {
            values: vec!["wallet".into(), "phone".into()],
        };
        assert!(p.matches(&item("x", "y", &["phone"])));
        assert!(p.matches(&item("x", "y", &["wallet", "keys"])));
        assert!(!p.matches(&item("x", "y", &["keys"])));
    }

    #[test]
    fn test_display() {
        let p = Predicate::prefix(ScalarField::Name, "bag");
        assert_eq!(p.to_string(), "name starts with \"bag\"");
    }
}

//! Query planner for text and label searches.
//!
//! The document store cannot answer "name starts with q OR category starts
//! with q OR labels contains q" in one round trip, so a text search is
//! split into three independent predicates, issued concurrently, and merged
//! client-side once every predicate has completed or failed.
//!
//! # Text search
//!
//! 1. Normalize the query (trim, lowercase). Empty → [`LostFoundError::InvalidQuery`].
//! 2. Issue `name` prefix range, `category` prefix range, `labels` contains.
//! 3. Merge in that order, de-duplicated by document key.
//! 4. A failing predicate contributes nothing and is reported in
//!    [`SearchResults::failures`]. Only when all three fail does the search
//!    return [`LostFoundError::SearchFailed`].
//!
//! # Label search
//!
//! One `array-contains-any` predicate (logical OR) over at most
//! [`DocumentStore::max_any_operands`] labels. Labels are expected in
//! confidence order; extras are dropped from the tail.
//!
//! Order within a predicate is whatever the store returns. It is
//! deterministic for a fixed store state but not otherwise guaranteed.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use crate::classifier::Classifier;
use crate::error::{LostFoundError, Result};
use crate::merge::ResultMerger;
use crate::models::{SearchQuery, StoredItem};
use crate::normalize::{normalize_labels, normalize_predictions, normalize_query};
use crate::store::{DocumentStore, Predicate, ScalarField};

/// Merged search output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    /// De-duplicated items in merge order.
    pub items: Vec<StoredItem>,
    /// Labels that were searched for (label and image searches only).
    pub labels: Vec<String>,
    /// Predicates that failed but did not abort the search.
    pub failures: Vec<PredicateFailure>,
}

/// A predicate that failed during a multi-predicate search.
#[derive(Debug, Clone, Serialize)]
pub struct PredicateFailure {
    pub predicate: String,
    pub error: String,
}

/// Builds store predicates for a query, runs them, and merges the results.
pub struct QueryPlanner {
    store: Arc<dyn DocumentStore>,
    classifier: Arc<dyn Classifier>,
}

impl QueryPlanner {
    pub fn new(store: Arc<dyn DocumentStore>, classifier: Arc<dyn Classifier>) -> Self {
        Self { store, classifier }
    }

    /// Translate a query into the predicates it needs, without running them.
    pub fn plan(&self, query: &SearchQuery) -> Result<Vec<Predicate>> {
        match query {
            SearchQuery::Text(text) => {
                let q = normalize_query(text);
                if q.is_empty() {
                    return Err(LostFoundError::InvalidQuery(
                        "enter a search query".to_string(),
                    ));
                }
                Ok(vec![
                    Predicate::prefix(ScalarField::Name, &q),
                    Predicate::prefix(ScalarField::Category, &q),
                    Predicate::ArrayContains { value: q },
                ])
            }
            SearchQuery::Labels(labels) => {
                let values = self.label_operands(labels);
                if values.is_empty() {
                    return Err(LostFoundError::InvalidQuery(
                        "no labels to search for".to_string(),
                    ));
                }
                Ok(vec![Predicate::ArrayContainsAny { values }])
            }
        }
    }

    /// Dispatch to [`search_by_text`](Self::search_by_text) or
    /// [`search_by_labels`](Self::search_by_labels).
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResults> {
        match query {
            SearchQuery::Text(text) => self.search_by_text(text).await,
            SearchQuery::Labels(labels) => self.search_by_labels(labels).await,
        }
    }

    /// Search items whose name or category starts with `query`, or whose
    /// labels contain it.
    pub async fn search_by_text(&self, query: &str) -> Result<SearchResults> {
        let predicates = self.plan(&SearchQuery::Text(query.to_string()))?;

        let outcomes = join_all(predicates.iter().map(|p| self.store.query(p))).await;

        let mut merger = ResultMerger::new();
        let mut failures = Vec::new();
        for (predicate, outcome) in predicates.iter().zip(outcomes) {
            match outcome {
                Ok(batch) => {
                    tracing::debug!(%predicate, hits = batch.len(), "predicate completed");
                    merger.push(batch);
                }
                Err(e) => {
                    tracing::warn!(%predicate, error = %e, "predicate query failed");
                    failures.push(PredicateFailure {
                        predicate: predicate.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if failures.len() == predicates.len() {
            let detail = failures
                .iter()
                .map(|f| format!("{}: {}", f.predicate, f.error))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(LostFoundError::SearchFailed(detail));
        }

        let items = merger.finish();
        tracing::info!(query = %normalize_query(query), results = items.len(), "text search");
        Ok(SearchResults {
            items,
            labels: Vec::new(),
            failures,
        })
    }

    /// Search items carrying any of `labels`.
    ///
    /// `labels` should be in descending confidence order; only the first
    /// [`DocumentStore::max_any_operands`] distinct normalized labels are
    /// sent. An empty set fails with [`LostFoundError::InvalidQuery`]
    /// without touching the store.
    pub async fn search_by_labels(&self, labels: &[String]) -> Result<SearchResults> {
        let predicates = self.plan(&SearchQuery::Labels(labels.to_vec()))?;
        let mut merger = ResultMerger::new();
        let mut searched = Vec::new();

        for predicate in &predicates {
            if let Predicate::ArrayContainsAny { values } = predicate {
                searched.extend(values.iter().cloned());
            }
            let batch = self.store.query(predicate).await.map_err(|e| {
                tracing::warn!(%predicate, error = %e, "label query failed");
                LostFoundError::SearchFailed(format!("{}: {}", predicate, e))
            })?;
            merger.push(batch);
        }

        let items = merger.finish();
        tracing::info!(labels = ?searched, results = items.len(), "label search");
        Ok(SearchResults {
            items,
            labels: searched,
            failures: Vec::new(),
        })
    }

    /// Classify `image` and search by the resulting labels.
    ///
    /// A classifier failure is treated the same as an empty result: the
    /// search ends with `InvalidQuery("no labels detected")` and the store
    /// is never queried.
    pub async fn label_and_search(&self, image: &[u8]) -> Result<SearchResults> {
        let predictions = match self.classifier.classify(image).await {
            Ok(p) => p,
            Err(e) if e.is_classification_failure() => {
                tracing::warn!(
                    classifier = self.classifier.name(),
                    error = %e,
                    "classification failed"
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let labels = normalize_predictions(&predictions);
        if labels.is_empty() {
            return Err(LostFoundError::InvalidQuery(
                "no labels detected".to_string(),
            ));
        }
        self.search_by_labels(&labels).await
    }

    fn label_operands(&self, labels: &[String]) -> Vec<String> {
        let mut values = normalize_labels(labels.iter().map(String::as_str));
        values.truncate(self.store.max_any_operands());
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::DisabledClassifier;
    use crate::models::{Item, LabelPrediction};
    use crate::store::memory::InMemoryItemStore;
    use crate::store::DEFAULT_MAX_ANY_OPERANDS;
    use anyhow::bail;
    use async_trait::async_trait;

    fn item(name: &str, category: &str, labels: &[&str]) -> Item {
        Item::new(
            name,
            category,
            format!("mem://{}", name),
            labels.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn planner(store: Arc<InMemoryItemStore>) -> QueryPlanner {
        QueryPlanner::new(store, Arc::new(DisabledClassifier))
    }

    fn keys(results: &SearchResults) -> Vec<&str> {
        results.items.iter().map(|s| s.key.as_str()).collect()
    }

    /// Fails every predicate on the given field, delegates the rest.
    struct FlakyStore {
        inner: InMemoryItemStore,
        fail_ranges: bool,
        fail_contains: bool,
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn query(&self, predicate: &Predicate) -> anyhow::Result<Vec<StoredItem>> {
            match predicate {
                Predicate::Range { .. } if self.fail_ranges => bail!("range index offline"),
                Predicate::ArrayContains { .. } | Predicate::ArrayContainsAny { .. }
                    if self.fail_contains =>
                {
                    bail!("label index offline")
                }
                _ => self.inner.query(predicate).await,
            }
        }

        async fn add(&self, item: &Item) -> anyhow::Result<String> {
            self.inner.add(item).await
        }
    }

    struct Labels(Vec<LabelPrediction>);

    #[async_trait]
    impl Classifier for Labels {
        fn name(&self) -> &str {
            "labels"
        }
        async fn classify(&self, _image: &[u8]) -> Result<Vec<LabelPrediction>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_text_search_merge_order() {
        let store = Arc::new(InMemoryItemStore::new());
        store.insert_with_key("label", item("red thing", "misc", &["bag"]));
        store.insert_with_key("category", item("green thing", "bags", &[]));
        store.insert_with_key("name", item("blue bag", "misc", &[]));
        store.insert_with_key("name2", item("bag of marbles", "toys", &[]));

        let results = planner(store.clone()).search_by_text("bag").await.unwrap();
        // "blue bag" does not start with "bag"; only "bag of marbles" matches by name.
        assert_eq!(keys(&results), vec!["name2", "category", "label"]);
        assert_eq!(store.query_count(), 3);
    }

    #[tokio::test]
    async fn test_text_search_dedups_overlapping_predicates() {
        let store = Arc::new(InMemoryItemStore::new());
        store.insert_with_key("all", item("bag", "bags", &["bag"]));
        store.insert_with_key("cat", item("tote", "bags", &["bag"]));

        let results = planner(store.clone())
            .search_by_text("  BAG ")
            .await
            .unwrap();
        assert_eq!(keys(&results), vec!["all", "cat"]);
        assert_eq!(store.query_count(), 3);
    }

    #[tokio::test]
    async fn test_text_search_empty_query() {
        let store = Arc::new(InMemoryItemStore::new());
        let err = planner(store.clone())
            .search_by_text("   ")
            .await
            .unwrap_err();
        assert!(matches!(err, LostFoundError::InvalidQuery(_)));
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn test_text_search_partial_failure_reported() {
        let inner = InMemoryItemStore::new();
        inner.insert_with_key("l", item("thing", "misc", &["bag"]));
        inner.insert_with_key("n", item("bag", "misc", &[]));
        let store = Arc::new(FlakyStore {
            inner,
            fail_ranges: true,
            fail_contains: false,
        });
        let planner = QueryPlanner::new(store, Arc::new(DisabledClassifier));

        let results = planner.search_by_text("bag").await.unwrap();
        assert_eq!(keys(&results), vec!["l"]);
        assert_eq!(results.failures.len(), 2);
        assert!(results.failures[0].predicate.starts_with("name"));
    }

    #[tokio::test]
    async fn test_text_search_all_failed() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryItemStore::new(),
            fail_ranges: true,
            fail_contains: true,
        });
        let planner = QueryPlanner::new(store, Arc::new(DisabledClassifier));
        let err = planner.search_by_text("bag").await.unwrap_err();
        assert!(matches!(err, LostFoundError::SearchFailed(_)));
    }

    #[tokio::test]
    async fn test_label_search_empty_issues_no_queries() {
        let store = Arc::new(InMemoryItemStore::new());
        let err = planner(store.clone())
            .search_by_labels(&[])
            .await
            .unwrap_err();
        assert!(matches!(err, LostFoundError::InvalidQuery(_)));
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn test_label_search_is_or() {
        let store = Arc::new(InMemoryItemStore::new());
        store.insert_with_key("w", item("a", "x", &["wallet"]));
        store.insert_with_key("p", item("b", "x", &["phone"]));
        store.insert_with_key("k", item("c", "x", &["keys"]));

        let labels = vec!["Wallet".to_string(), "phone".to_string()];
        let results = planner(store).search_by_labels(&labels).await.unwrap();
        assert_eq!(keys(&results), vec!["w", "p"]);
        assert_eq!(results.labels, vec!["wallet", "phone"]);
    }

    #[tokio::test]
    async fn test_label_search_truncates_to_cap() {
        let store = Arc::new(InMemoryItemStore::new());
        let labels: Vec<String> = (0..13).map(|i| format!("label{}", i)).collect();

        planner(store.clone())
            .search_by_labels(&labels)
            .await
            .unwrap();

        let issued = store.issued_queries();
        assert_eq!(issued.len(), 1);
        match &issued[0] {
            Predicate::ArrayContainsAny { values } => {
                assert_eq!(values.len(), 10);
                assert_eq!(values[0], "label0");
                assert_eq!(values[9], "label9");
            }
            other => panic!("unexpected predicate: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_label_search_exactly_cap_not_truncated() {
        let store = Arc::new(InMemoryItemStore::new());
        let labels: Vec<String> = (0..10).map(|i| format!("l{}", i)).collect();
        let results = planner(store).search_by_labels(&labels).await.unwrap();
        assert_eq!(results.labels.len(), 10);
    }

    #[tokio::test]
    async fn test_label_search_failure_is_search_failed() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryItemStore::new(),
            fail_ranges: false,
            fail_contains: true,
        });
        let planner = QueryPlanner::new(store, Arc::new(DisabledClassifier));
        let err = planner
            .search_by_labels(&["bag".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, LostFoundError::SearchFailed(_)));
    }

    #[tokio::test]
    async fn test_label_and_search_no_labels() {
        let store = Arc::new(InMemoryItemStore::new());
        let planner = QueryPlanner::new(store.clone(), Arc::new(Labels(vec![])));
        let err = planner.label_and_search(b"img").await.unwrap_err();
        match err {
            LostFoundError::InvalidQuery(msg) => assert_eq!(msg, "no labels detected"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn test_label_and_search_model_unavailable_degrades() {
        let store = Arc::new(InMemoryItemStore::new());
        let planner = QueryPlanner::new(store.clone(), Arc::new(DisabledClassifier));
        let err = planner.label_and_search(b"img").await.unwrap_err();
        assert!(matches!(err, LostFoundError::InvalidQuery(_)));
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn test_label_and_search_normalizes_predictions() {
        let store = Arc::new(InMemoryItemStore::new());
        store.insert_with_key("bp", item("blue backpack", "bags", &["backpack"]));
        let planner = QueryPlanner::new(
            store,
            Arc::new(Labels(vec![LabelPrediction::new("3 Backpack", 0.92)])),
        );
        let results = planner.label_and_search(b"img").await.unwrap();
        assert_eq!(keys(&results), vec!["bp"]);
        assert_eq!(results.labels, vec!["backpack"]);
    }

    #[test]
    fn test_plan_text_shapes() {
        let planner = planner(Arc::new(InMemoryItemStore::new()));
        let preds = planner.plan(&SearchQuery::Text("Bag".into())).unwrap();
        assert_eq!(preds.len(), 3);
        assert_eq!(preds[0], Predicate::prefix(ScalarField::Name, "bag"));
        assert_eq!(preds[1], Predicate::prefix(ScalarField::Category, "bag"));
        assert_eq!(
            preds[2],
            Predicate::ArrayContains {
                value: "bag".into()
            }
        );
    }

    #[test]
    fn test_plan_labels_caps_operands() {
        let planner = planner(Arc::new(InMemoryItemStore::new()));
        let labels: Vec<String> = (0..12).map(|i| format!("{} label{}", i, i)).collect();
        let preds = planner.plan(&SearchQuery::Labels(labels)).unwrap();
        assert_eq!(preds.len(), 1);
        match &preds[0] {
            Predicate::ArrayContainsAny { values } => {
                assert_eq!(values.len(), DEFAULT_MAX_ANY_OPERANDS);
                assert_eq!(values[0], "label0");
                assert_eq!(values[9], "label9");
            }
            other => panic!("unexpected predicate: {:?}", other),
        }
    }

    #[test]
    fn test_plan_blank_labels_invalid() {
        let planner = planner(Arc::new(InMemoryItemStore::new()));
        let err = planner
            .plan(&SearchQuery::Labels(vec!["  ".to_string()]))
            .unwrap_err();
        assert!(matches!(err, LostFoundError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_search_dispatches_text() {
        let store = Arc::new(InMemoryItemStore::new());
        store.insert_with_key("n", item("bag of marbles", "toys", &[]));
        store.insert_with_key("l", item("thing", "misc", &["bag"]));
        let planner = planner(store.clone());

        let via_search = planner
            .search(&SearchQuery::Text("Bag".into()))
            .await
            .unwrap();
        let direct = planner.search_by_text("Bag").await.unwrap();
        assert_eq!(keys(&via_search), keys(&direct));
        assert_eq!(keys(&via_search), vec!["n", "l"]);
        assert_eq!(store.query_count(), 6);
    }

    #[tokio::test]
    async fn test_search_dispatches_labels() {
        let store = Arc::new(InMemoryItemStore::new());
        store.insert_with_key("w", item("a", "x", &["wallet"]));
        store.insert_with_key("k", item("b", "x", &["keys"]));
        let planner = planner(store.clone());
        let labels = vec!["keys".to_string(), "phone".to_string()];

        let via_search = planner
            .search(&SearchQuery::Labels(labels.clone()))
            .await
            .unwrap();
        let direct = planner.search_by_labels(&labels).await.unwrap();
        assert_eq!(keys(&via_search), keys(&direct));
        assert_eq!(keys(&via_search), vec!["k"]);
        assert_eq!(via_search.labels, vec!["keys", "phone"]);
        assert_eq!(store.query_count(), 2);
    }
}

//! Ordered, duplicate-free merging of per-predicate result lists.
//!
//! Batches are appended in the order they are pushed. Within a batch the
//! store's order is kept. An item whose key has already been seen is
//! skipped, so the first predicate to return an item decides its position.
//! Membership uses a hash set keyed by document key rather than a linear
//! scan; the observable order is the same.

use std::collections::HashSet;

use crate::models::StoredItem;

#[derive(Debug, Default)]
pub struct ResultMerger {
    seen: HashSet<String>,
    items: Vec<StoredItem>,
}

impl ResultMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch, skipping keys already present. Returns how many
    /// items were added.
    pub fn push(&mut self, batch: Vec<StoredItem>) -> usize {
        let before = self.items.len();
        for stored in batch {
            if self.seen.insert(stored.key.clone()) {
                self.items.push(stored);
            }
        }
        self.items.len() - before
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn finish(self) -> Vec<StoredItem> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Item;

    fn stored(key: &str) -> StoredItem {
        StoredItem {
            key: key.to_string(),
            item: Item::new(key, "misc", String::new(), vec![]),
        }
    }

    fn merge(batches: Vec<Vec<StoredItem>>) -> Vec<StoredItem> {
        let mut merger = ResultMerger::new();
        for batch in batches {
            merger.push(batch);
        }
        merger.finish()
    }

    fn keys(items: &[StoredItem]) -> Vec<&str> {
        items.iter().map(|s| s.key.as_str()).collect()
    }

    #[test]
    fn test_merge_keeps_batch_order() {
        let merged = merge(vec![
            vec![stored("n1"), stored("n2")],
            vec![stored("c1")],
            vec![stored("l1")],
        ]);
        assert_eq!(keys(&merged), vec!["n1", "n2", "c1", "l1"]);
    }

    #[test]
    fn test_merge_dedups_first_occurrence_wins() {
        let merged = merge(vec![
            vec![stored("a"), stored("b")],
            vec![stored("b"), stored("c")],
            vec![stored("a"), stored("c"), stored("d")],
        ]);
        assert_eq!(keys(&merged), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_merge_dedups_within_batch() {
        let merged = merge(vec![vec![stored("a"), stored("a")]]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_push_reports_added() {
        let mut merger = ResultMerger::new();
        assert_eq!(merger.push(vec![stored("a"), stored("b")]), 2);
        assert_eq!(merger.push(vec![stored("b"), stored("c")]), 1);
        assert_eq!(merger.len(), 3);
        assert!(!merger.is_empty());
    }

    #[test]
    fn test_merge_empty() {
        let merged = merge(Vec::new());
        assert!(merged.is_empty());
    }
}

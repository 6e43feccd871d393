//! In-memory [`DocumentStore`] and [`BlobStore`] implementations.
//!
//! Items are kept in insertion order behind `std::sync::RwLock`; queries
//! scan linearly. Every predicate issued is recorded so callers can
//! inspect what a search actually asked for.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{Item, StoredItem};

use super::{BlobStore, DocumentStore, Predicate, DEFAULT_MAX_ANY_OPERANDS};

/// In-memory item store for tests and embedding.
pub struct InMemoryItemStore {
    items: RwLock<Vec<StoredItem>>,
    queries: Mutex<Vec<Predicate>>,
    max_any_operands: usize,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::with_max_any_operands(DEFAULT_MAX_ANY_OPERANDS)
    }

    pub fn with_max_any_operands(max_any_operands: usize) -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
            max_any_operands,
        }
    }

    /// Insert an item under a caller-chosen key.
    pub fn insert_with_key(&self, key: &str, item: Item) {
        self.items.write().unwrap().push(StoredItem {
            key: key.to_string(),
            item,
        });
    }

    /// Snapshot of every stored item, in insertion order.
    pub fn items(&self) -> Vec<StoredItem> {
        self.items.read().unwrap().clone()
    }

    /// Every predicate issued so far, in order.
    pub fn issued_queries(&self) -> Vec<Predicate> {
        self.queries.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

impl Default for InMemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryItemStore {
    async fn query(&self, predicate: &Predicate) -> Result<Vec<StoredItem>> {
        self.queries.lock().unwrap().push(predicate.clone());

        if let Predicate::ArrayContainsAny { values } = predicate {
            if values.is_empty() {
                bail!("array-contains-any requires at least one value");
            }
            if values.len() > self.max_any_operands {
                bail!(
                    "array-contains-any supports at most {} values, got {}",
                    self.max_any_operands,
                    values.len()
                );
            }
        }

        let items = self.items.read().unwrap();
        Ok(items
            .iter()
            .filter(|s| predicate.matches(&s.item))
            .cloned()
            .collect())
    }

    async fn add(&self, item: &Item) -> Result<String> {
        let key = uuid::Uuid::new_v4().to_string();
        self.insert_with_key(&key, item.clone());
        Ok(key)
    }

    fn max_any_operands(&self) -> usize {
        self.max_any_operands
    }
}

/// In-memory blob store returning `mem://` URLs.
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.read().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String> {
        let mut blobs = self.blobs.write().unwrap();
        if blobs.contains_key(key) {
            bail!("blob key already exists: {}", key);
        }
        blobs.insert(key.to_string(), bytes.to_vec());
        Ok(format!("mem://{}", key))
    }
}

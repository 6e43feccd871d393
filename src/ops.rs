//! Cancellable background operations and the service facade.
//!
//! Every search or submission runs as its own tokio task behind an
//! [`OperationHandle`]. Awaiting the handle yields the result; calling
//! [`OperationHandle::cancel`] or dropping the handle aborts the task, and
//! whatever it would have produced is discarded.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use lost_found_core::catalogue::{CatalogueWriter, SubmitRequest};
use lost_found_core::classifier::Classifier;
use lost_found_core::models::StoredItem;
use lost_found_core::search::{QueryPlanner, SearchResults};
use lost_found_core::store::{BlobStore, DocumentStore};
use lost_found_core::{LostFoundError, Result};

use crate::blob_fs::FsBlobStore;
use crate::classifier::create_classifier;
use crate::config::Config;
use crate::db;
use crate::migrate::create_schema;
use crate::sqlite_store::SqliteItemStore;

/// Handle to a spawned operation.
///
/// Resolves to [`LostFoundError::Cancelled`] if the task was aborted, or if
/// polled again after it already produced its result.
pub struct OperationHandle<T> {
    task: Option<JoinHandle<Result<T>>>,
}

impl<T: Send + 'static> OperationHandle<T> {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            task: Some(tokio::spawn(future)),
        }
    }
}

impl<T> OperationHandle<T> {
    pub fn cancel(&self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

impl<T> Future for OperationHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(task) = self.task.as_mut() else {
            return Poll::Ready(Err(LostFoundError::Cancelled));
        };
        match Pin::new(task).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(joined) => {
                self.task = None;
                Poll::Ready(match joined {
                    Ok(result) => result,
                    Err(e) if e.is_cancelled() => Err(LostFoundError::Cancelled),
                    Err(e) => std::panic::resume_unwind(e.into_panic()),
                })
            }
        }
    }
}

impl<T> Drop for OperationHandle<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Search and catalogue service shared by the CLI and embedders.
#[derive(Clone)]
pub struct LostFound {
    planner: Arc<QueryPlanner>,
    writer: Arc<CatalogueWriter>,
    classifier: Arc<dyn Classifier>,
}

impl LostFound {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        classifier: Arc<dyn Classifier>,
        key_prefix: &str,
    ) -> Self {
        let planner = QueryPlanner::new(store.clone(), classifier.clone());
        let writer =
            CatalogueWriter::new(classifier.clone(), store, blobs).with_key_prefix(key_prefix);
        Self {
            planner: Arc::new(planner),
            writer: Arc::new(writer),
            classifier,
        }
    }

    /// Open the SQLite catalogue, the blob directory, and the configured
    /// classifier. Creates the schema if it does not exist yet.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        create_schema(&pool).await?;
        let store = SqliteItemStore::with_max_any_operands(pool, config.search.max_any_operands);
        let blobs = FsBlobStore::from_config(&config.blobs);
        let classifier = create_classifier(&config.classifier)?;
        Ok(Self::new(
            Arc::new(store),
            Arc::new(blobs),
            classifier,
            &config.blobs.key_prefix,
        ))
    }

    pub fn classifier(&self) -> &Arc<dyn Classifier> {
        &self.classifier
    }

    pub fn spawn_search_text(&self, query: impl Into<String>) -> OperationHandle<SearchResults> {
        let planner = self.planner.clone();
        let query = query.into();
        OperationHandle::spawn(async move { planner.search_by_text(&query).await })
    }

    pub fn spawn_search_labels(&self, labels: Vec<String>) -> OperationHandle<SearchResults> {
        let planner = self.planner.clone();
        OperationHandle::spawn(async move { planner.search_by_labels(&labels).await })
    }

    pub fn spawn_label_and_search(&self, image: Vec<u8>) -> OperationHandle<SearchResults> {
        let planner = self.planner.clone();
        OperationHandle::spawn(async move { planner.label_and_search(&image).await })
    }

    pub fn spawn_submit(&self, request: SubmitRequest) -> OperationHandle<StoredItem> {
        let writer = self.writer.clone();
        OperationHandle::spawn(async move { writer.submit(request).await })
    }
}

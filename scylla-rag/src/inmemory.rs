//! In-memory vector store using exact cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by a
//! `HashMap` protected by a `tokio::sync::RwLock`. It is suitable for
//! development, testing, and small corpora.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Record, RetrievedChunk};
use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "InMemory";

#[derive(Debug)]
struct Collection {
    dimensions: usize,
    // insertion order doubles as the tie-break order for equal scores
    records: Vec<Record>,
}

/// An in-memory vector store using cosine similarity for search.
///
/// Collections map a name to an insertion-ordered list of records. Search is
/// exhaustive, so results are exact rather than approximate.
///
/// # Example
///
/// ```rust,ignore
/// use scylla_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", 768).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
    closed: AtomicBool,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored in `collection`, or `None` if it does not exist.
    pub async fn len(&self, collection: &str) -> Option<usize> {
        self.collections.read().await.get(collection).map(|c| c.records.len())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RagError::ConnectionError {
                backend: BACKEND.to_string(),
                message: "store has been shut down".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        self.ensure_open()?;
        let mut collections = self.collections.write().await;
        collections
            .entry(name.to_string())
            .or_insert_with(|| Collection { dimensions, records: Vec::new() });
        Ok(())
    }

    async fn insert(&self, record: &Record) -> Result<()> {
        self.ensure_open()?;
        let mut collections = self.collections.write().await;
        let collection =
            collections.get_mut(&record.collection).ok_or_else(|| RagError::IndexWriteError {
                backend: BACKEND.to_string(),
                message: format!("collection '{}' does not exist", record.collection),
            })?;

        if record.embedding.len() != collection.dimensions {
            return Err(RagError::IndexWriteError {
                backend: BACKEND.to_string(),
                message: format!(
                    "collection '{}' stores {}-dimensional vectors, record has {}",
                    record.collection,
                    collection.dimensions,
                    record.embedding.len()
                ),
            });
        }

        collection.records.push(record.clone());
        debug!(collection = %record.collection, id = %record.id, "inserted record");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        self.ensure_open()?;
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| RagError::RetrievalError {
            backend: BACKEND.to_string(),
            message: format!("collection '{collection}' does not exist"),
        })?;

        if embedding.len() != store.dimensions {
            return Err(RagError::RetrievalError {
                backend: BACKEND.to_string(),
                message: format!(
                    "query has {} dimensions, collection '{collection}' stores {}",
                    embedding.len(),
                    store.dimensions
                ),
            });
        }

        let mut scored: Vec<RetrievedChunk> = store
            .records
            .iter()
            .map(|record| RetrievedChunk {
                id: record.id,
                text: record.text.clone(),
                score: cosine_similarity(&record.embedding, embedding),
            })
            .collect();

        // stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn shutdown(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn record(collection: &str, text: &str, embedding: Vec<f32>) -> Record {
        Record { id: Uuid::new_v4(), text: text.into(), embedding, collection: collection.into() }
    }

    #[tokio::test]
    async fn insert_into_missing_collection_fails() {
        let store = InMemoryVectorStore::new();
        let err = store.insert(&record("nope", "a", vec![1.0])).await.unwrap_err();
        assert!(matches!(err, RagError::IndexWriteError { .. }));
    }

    #[tokio::test]
    async fn insert_rejects_wrong_dimension() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 3).await.unwrap();
        let err = store.insert(&record("docs", "a", vec![1.0, 0.0])).await.unwrap_err();
        assert!(matches!(err, RagError::IndexWriteError { .. }));
        assert_eq!(store.len("docs").await, Some(0));
    }

    #[tokio::test]
    async fn equal_scores_keep_insertion_order() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2).await.unwrap();
        let first = record("docs", "first", vec![1.0, 0.0]);
        let second = record("docs", "second", vec![2.0, 0.0]);
        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();

        let results = store.search("docs", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results[0].id, first.id);
        assert_eq!(results[1].id, second.id);
    }

    #[tokio::test]
    async fn shutdown_closes_the_handle() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 1).await.unwrap();
        store.shutdown().await.unwrap();
        let err = store.search("docs", &[1.0], 1).await.unwrap_err();
        assert!(err.is_fatal());
    }
}

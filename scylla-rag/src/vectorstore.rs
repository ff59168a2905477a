//! Vector store trait for storing and searching vector embeddings.

use async_trait::async_trait;

use crate::document::{Record, RetrievedChunk};
use crate::error::Result;

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named collections of [`Record`]s. Records are
/// written once and never updated. A store is an owned handle: acquire it
/// with the backend's `connect`, share it through an `Arc`, and release it
/// with [`shutdown`](VectorStore::shutdown) when the operation is done.
///
/// # Example
///
/// ```rust,ignore
/// use scylla_rag::{VectorStore, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", 768).await?;
/// store.insert(&record).await?;
/// let results = store.search("docs", &query_embedding, 5).await?;
/// store.shutdown().await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Insert a record into the collection named by `record.collection`.
    async fn insert(&self, record: &Record) -> Result<()>;

    /// Search for the `top_k` most similar records to the given embedding
    /// under cosine similarity.
    ///
    /// Returns results ordered by descending similarity score. Ordering of
    /// equal scores is backend-defined.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>>;

    /// Release the underlying connection. Further calls fail with
    /// [`RagError::ConnectionError`](crate::RagError::ConnectionError).
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

//! Embedding chunks and writing them to a vector store.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::FailurePolicy;
use crate::document::{Chunk, Record};
use crate::embedding::{EmbeddingProvider, ensure_dimensions};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// A chunk that could not be embedded or stored.
#[derive(Debug)]
pub struct IndexFailure {
    /// The [`Chunk::id`] of the failed chunk.
    pub chunk_id: String,
    pub error: RagError,
}

/// Outcome of one [`Indexer::index`] call.
#[derive(Debug)]
pub struct IndexReport {
    pub collection: String,
    /// Record IDs written, in chunk input order.
    pub indexed: Vec<Uuid>,
    /// Chunks skipped under [`FailurePolicy::BestEffort`].
    pub failures: Vec<IndexFailure>,
}

impl IndexReport {
    fn new(collection: &str) -> Self {
        Self { collection: collection.to_string(), indexed: Vec::new(), failures: Vec::new() }
    }

    /// Whether every chunk was indexed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Turns chunks into [`Record`]s: a fresh UUID, an embedding and one insert each.
///
/// Indexing is not atomic. Records inserted before a failure stay visible.
pub struct Indexer {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    policy: FailurePolicy,
    batch_size: usize,
}

impl Indexer {
    /// Create an indexer with [`FailurePolicy::BestEffort`] and one chunk per
    /// embedding call.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store, policy: FailurePolicy::default(), batch_size: 1 }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Embed up to `size` chunks per embedding call. Zero is treated as one.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Embed and insert `chunks` into `collection` in input order.
    ///
    /// # Errors
    ///
    /// Returns the first chunk failure under [`FailurePolicy::FailFast`], and
    /// any [`RagError::ConnectionError`] under either policy.
    #[instrument(name = "rag.index", skip_all, fields(collection = %collection, chunk_count = chunks.len()))]
    pub async fn index(&self, chunks: &[Chunk], collection: &str) -> Result<IndexReport> {
        let mut report = IndexReport::new(collection);

        for batch in chunks.chunks(self.batch_size) {
            let embeddings: Vec<Result<Vec<f32>>> = match self.embed(batch).await {
                Ok(embeddings) => embeddings.into_iter().map(Ok).collect(),
                Err(e) if e.is_fatal() || self.policy == FailurePolicy::FailFast => return Err(e),
                // retry one by one so a single bad chunk cannot sink its batch
                Err(e) if batch.len() > 1 => {
                    warn!(error = %e, batch_size = batch.len(), "batch embedding failed, retrying per chunk");
                    let mut single = Vec::with_capacity(batch.len());
                    for chunk in batch {
                        single.push(self.embedder.embed(&chunk.text).await);
                    }
                    single
                }
                Err(e) => vec![Err(e)],
            };

            for (chunk, embedding) in batch.iter().zip(embeddings) {
                let outcome = match embedding {
                    Ok(embedding) => self.store_chunk(chunk, embedding, collection).await,
                    Err(e) => Err(e),
                };
                match outcome {
                    Ok(id) => report.indexed.push(id),
                    Err(e) => self.record_failure(&mut report, chunk, e)?,
                }
            }
        }

        info!(
            collection,
            indexed = report.indexed.len(),
            failed = report.failures.len(),
            "indexed chunks"
        );
        Ok(report)
    }

    async fn embed(&self, batch: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != batch.len() {
            return Err(RagError::EmbeddingError {
                provider: "embedder".to_string(),
                message: format!(
                    "requested {} embeddings, received {}",
                    batch.len(),
                    embeddings.len()
                ),
            });
        }
        Ok(embeddings)
    }

    async fn store_chunk(
        &self,
        chunk: &Chunk,
        embedding: Vec<f32>,
        collection: &str,
    ) -> Result<Uuid> {
        ensure_dimensions("embedder", &embedding, self.embedder.dimensions())?;
        let record = Record {
            id: Uuid::new_v4(),
            text: chunk.text.clone(),
            embedding,
            collection: collection.to_string(),
        };
        self.store.insert(&record).await?;
        debug!(chunk.id = %chunk.id, record.id = %record.id, "stored chunk");
        Ok(record.id)
    }

    fn record_failure(&self, report: &mut IndexReport, chunk: &Chunk, error: RagError) -> Result<()> {
        if error.is_fatal() || self.policy == FailurePolicy::FailFast {
            error!(chunk.id = %chunk.id, error = %error, "indexing aborted");
            return Err(error);
        }
        warn!(chunk.id = %chunk.id, error = %error, "skipping chunk");
        report.failures.push(IndexFailure { chunk_id: chunk.id.clone(), error });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::document::Document;
    use crate::inmemory::InMemoryVectorStore;

    /// Embeds text to its length; refuses text containing "poison".
    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("poison") {
                return Err(RagError::EmbeddingError {
                    provider: "test".into(),
                    message: "refused".into(),
                });
            }
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        let doc = Document::new("doc", texts.join(" "));
        texts.iter().enumerate().map(|(i, t)| Chunk::from_document(&doc, i, t.to_string())).collect()
    }

    async fn store() -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        store.create_collection("docs", 2).await.unwrap();
        store
    }

    #[tokio::test]
    async fn best_effort_skips_failed_chunks() {
        let store = store().await;
        let indexer = Indexer::new(Arc::new(LengthEmbedder), store.clone());

        let report = indexer.index(&chunks(&["one", "poison", "three"]), "docs").await.unwrap();
        assert_eq!(report.indexed.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].chunk_id, "doc_1");
        assert!(!report.is_complete());
        assert_eq!(store.len("docs").await, Some(2));
    }

    #[tokio::test]
    async fn fail_fast_stops_but_keeps_earlier_records() {
        let store = store().await;
        let indexer = Indexer::new(Arc::new(LengthEmbedder), store.clone())
            .with_failure_policy(FailurePolicy::FailFast);

        let err = indexer.index(&chunks(&["one", "poison", "three"]), "docs").await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingError { .. }));
        assert_eq!(store.len("docs").await, Some(1));
    }

    #[tokio::test]
    async fn batching_falls_back_to_single_chunks() {
        let store = store().await;
        let indexer = Indexer::new(Arc::new(LengthEmbedder), store.clone()).with_batch_size(4);

        let report = indexer.index(&chunks(&["a", "poison", "c"]), "docs").await.unwrap();
        assert_eq!(report.indexed.len(), 2);
        assert_eq!(report.failures.len(), 1);
    }

    #[tokio::test]
    async fn missing_collection_is_an_index_write_failure() {
        let store = Arc::new(InMemoryVectorStore::new());
        let indexer = Indexer::new(Arc::new(LengthEmbedder), store);

        let report = indexer.index(&chunks(&["a"]), "nope").await.unwrap();
        assert!(matches!(report.failures[0].error, RagError::IndexWriteError { .. }));
    }

    #[tokio::test]
    async fn connection_errors_abort_under_best_effort() {
        let store = store().await;
        store.shutdown().await.unwrap();
        let indexer = Indexer::new(Arc::new(LengthEmbedder), store);

        let err = indexer.index(&chunks(&["a", "b"]), "docs").await.unwrap_err();
        assert!(err.is_fatal());
    }
}

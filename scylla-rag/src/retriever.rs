//! Top-k similarity retrieval for a query.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::document::RetrievedChunk;
use crate::embedding::{EmbeddingProvider, ensure_dimensions};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Finds the chunks most similar to a query.
///
/// Results are ordered by non-increasing cosine similarity. Equal scores keep
/// the order the store returned them in.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    min_score: Option<f32>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store, min_score: None }
    }

    /// Drop results scoring below `min_score`.
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    /// Return the `k` chunks of `collection` most similar to `query`.
    ///
    /// A `k` larger than the collection returns every record.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if `k == 0`
    /// - [`RagError::EmbeddingError`] if the query cannot be embedded
    /// - [`RagError::RetrievalError`] if the search fails or the collection is empty
    #[instrument(name = "rag.retrieve", skip_all, fields(collection = %collection, k = k))]
    pub async fn retrieve(
        &self,
        query: &str,
        collection: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Err(RagError::ConfigError("k must be greater than zero".to_string()));
        }

        let embedding = self.embedder.embed(query).await.map_err(|e| {
            error!(error = %e, "embedding failed during retrieval");
            e
        })?;
        ensure_dimensions("embedder", &embedding, self.embedder.dimensions())?;

        let mut results = self.store.search(collection, &embedding, k).await.map_err(|e| {
            error!(collection, error = %e, "vector store search failed");
            e
        })?;

        if results.is_empty() {
            return Err(RagError::RetrievalError {
                backend: "VectorStore".to_string(),
                message: format!("collection '{collection}' is empty"),
            });
        }

        // ANN backends do not guarantee exact ordering
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        results.truncate(k);
        if let Some(min_score) = self.min_score {
            results.retain(|r| r.score >= min_score);
        }

        info!(result_count = results.len(), "retrieval completed");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::document::Record;
    use crate::inmemory::InMemoryVectorStore;

    /// Maps the first character to a direction on the unit circle.
    struct AngleEmbedder;

    #[async_trait]
    impl EmbeddingProvider for AngleEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let angle = text.chars().next().map_or(0.0_f32, |c| (c as u32 % 90) as f32).to_radians();
            Ok(vec![angle.cos(), angle.sin()])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    async fn seeded(texts: &[&str]) -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        store.create_collection("docs", 2).await.unwrap();
        for text in texts {
            let embedding = AngleEmbedder.embed(text).await.unwrap();
            let record = Record {
                id: Uuid::new_v4(),
                text: text.to_string(),
                embedding,
                collection: "docs".into(),
            };
            store.insert(&record).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn returns_best_matches_first() {
        let retriever = Retriever::new(Arc::new(AngleEmbedder), seeded(&["a", "b", "z"]).await);
        let results = retriever.retrieve("a", "docs", 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "a");
        assert!((results[0].score - 1.0).abs() < 1e-5);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn k_larger_than_collection_returns_everything() {
        let retriever = Retriever::new(Arc::new(AngleEmbedder), seeded(&["a", "b", "c"]).await);
        assert_eq!(retriever.retrieve("a", "docs", 50).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn ties_keep_store_order() {
        let retriever =
            Retriever::new(Arc::new(AngleEmbedder), seeded(&["b first", "b second"]).await);
        let results = retriever.retrieve("b", "docs", 2).await.unwrap();
        assert_eq!(results[0].text, "b first");
        assert_eq!(results[1].text, "b second");
    }

    #[tokio::test]
    async fn zero_k_is_a_config_error() {
        let retriever = Retriever::new(Arc::new(AngleEmbedder), seeded(&["a"]).await);
        let err = retriever.retrieve("a", "docs", 0).await.unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[tokio::test]
    async fn empty_collection_is_a_retrieval_error() {
        let retriever = Retriever::new(Arc::new(AngleEmbedder), seeded(&[]).await);
        let err = retriever.retrieve("a", "docs", 3).await.unwrap_err();
        assert!(matches!(err, RagError::RetrievalError { .. }));
    }

    #[tokio::test]
    async fn min_score_filters_weak_matches() {
        let retriever = Retriever::new(Arc::new(AngleEmbedder), seeded(&["a", "z"]).await)
            .with_min_score(Some(0.99));
        let results = retriever.retrieve("a", "docs", 2).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "a");
    }
}

//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the full ingest-and-answer workflow by
//! composing an [`EmbeddingProvider`], a [`VectorStore`], a [`Chunker`],
//! and an optional [`ChatModel`].
//!
//! # Example
//!
//! ```rust,ignore
//! use scylla_rag::{RagPipeline, RagConfig, InMemoryVectorStore};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .chat_model(Arc::new(my_model))
//!     .build()?;
//!
//! pipeline.create_collection("docs").await?;
//! pipeline.ingest("docs", &documents).await?;
//! let answer = pipeline.answer("docs", "What is a keyspace?").await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{Instrument, error, info, info_span};

use crate::chunking::{Chunker, build_chunker, chunk_documents};
use crate::composer::AnswerComposer;
use crate::config::RagConfig;
use crate::document::{Document, RetrievedChunk};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::indexer::{IndexReport, Indexer};
use crate::model::{ChatModel, TokenStream};
use crate::retriever::Retriever;
use crate::vectorstore::VectorStore;

/// The chunks an answer is grounded in, and the answer itself as a stream.
pub struct Answer {
    /// Retrieved chunks in rank order.
    pub chunks: Vec<RetrievedChunk>,
    pub stream: TokenStream,
}

/// The RAG pipeline orchestrator.
///
/// Coordinates document ingestion (chunk → embed → store) and question
/// answering (embed → search → compose). Construct one via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    chat_model: Option<Arc<dyn ChatModel>>,
    diagnostics: Option<PathBuf>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Create a named collection in the vector store.
    ///
    /// The collection is created with the dimensionality reported by the
    /// configured [`EmbeddingProvider`].
    pub async fn create_collection(&self, name: &str) -> Result<()> {
        let dimensions = self.embedding_provider.dimensions();
        self.vector_store.create_collection(name, dimensions).await.map_err(|e| {
            error!(collection = name, error = %e, "failed to create collection");
            e
        })
    }

    /// Ingest documents: chunk → embed → store.
    ///
    /// Chunk-level failures are handled according to the configured
    /// [`FailurePolicy`](crate::FailurePolicy) and reported in the
    /// returned [`IndexReport`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ChunkingError`] if a document cannot be chunked,
    /// and any error the [`Indexer`] does not absorb.
    pub async fn ingest(&self, collection: &str, documents: &[Document]) -> Result<IndexReport> {
        let chunks = chunk_documents(self.chunker.as_ref(), documents)
            .instrument(info_span!("rag.chunk", document_count = documents.len()))
            .await
            .map_err(|e| {
                error!(collection, error = %e, "chunking failed during ingestion");
                e
            })?;

        let report = Indexer::new(self.embedding_provider.clone(), self.vector_store.clone())
            .with_failure_policy(self.config.failure_policy)
            .with_batch_size(self.config.embed_batch_size)
            .index(&chunks, collection)
            .await?;

        info!(
            collection,
            document_count = documents.len(),
            chunk_count = chunks.len(),
            failed = report.failures.len(),
            "ingested documents"
        );
        Ok(report)
    }

    /// Retrieve the `top_k` chunks most similar to `query`.
    pub async fn retrieve(&self, collection: &str, query: &str) -> Result<Vec<RetrievedChunk>> {
        Retriever::new(self.embedding_provider.clone(), self.vector_store.clone())
            .with_min_score(self.config.min_score)
            .retrieve(query, collection, self.config.top_k)
            .await
    }

    /// Retrieve context for `query` and start generating a grounded answer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if no chat model is configured,
    /// otherwise any retrieval or generation-start error.
    pub async fn answer(&self, collection: &str, query: &str) -> Result<Answer> {
        let model = self.chat_model.clone().ok_or_else(|| {
            RagError::ConfigError("answering requires a chat model".to_string())
        })?;

        let chunks = self.retrieve(collection, query).await?;

        let mut composer = AnswerComposer::new(model);
        if let Some(path) = &self.diagnostics {
            composer = composer.with_diagnostics(path.clone());
        }
        let stream = composer.compose(query, &chunks).await?;

        Ok(Answer { chunks, stream })
    }

    /// Release the vector store handle.
    pub async fn shutdown(&self) -> Result<()> {
        self.vector_store.shutdown().await
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider` and `vector_store` are required. Without an
/// explicit `chunker`, the strategy named in the config is used. Call
/// [`build()`](RagPipelineBuilder::build) to validate and produce the pipeline.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .vector_store(Arc::new(store))
///     .chunker(Arc::new(MarkdownChunker::new(2048)))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    chat_model: Option<Arc<dyn ChatModel>>,
    diagnostics: Option<PathBuf>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Override the chunker built from the config.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the model used by [`RagPipeline::answer`].
    pub fn chat_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.chat_model = Some(model);
        self
    }

    /// Write each grounding prompt to `path` before generation.
    pub fn diagnostics(mut self, path: impl Into<PathBuf>) -> Self {
        self.diagnostics = Some(path.into());
        self
    }

    /// Build the [`RagPipeline`], validating the config and required fields.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the config is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let chunker = self
            .chunker
            .unwrap_or_else(|| build_chunker(&config.chunking, embedding_provider.clone()));

        Ok(RagPipeline {
            config,
            embedding_provider,
            vector_store,
            chunker,
            chat_model: self.chat_model,
            diagnostics: self.diagnostics,
        })
    }
}

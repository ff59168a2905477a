//! # scylla-rag
//!
//! Retrieval-augmented generation over ScyllaDB vector search.
//!
//! ## Overview
//!
//! Documents are split into chunks, embedded and written to a vector store.
//! Questions are embedded, matched against the stored chunks by cosine
//! similarity, and answered by a chat model grounded in the best matches.
//!
//! - [`MarkdownChunker`] - one chunk per markdown section
//! - [`SemanticDoubleMergeChunker`] - sentence merging gated by embedding similarity
//! - [`Indexer`] - chunk → embedding → [`Record`]
//! - [`Retriever`] - top-k similarity search
//! - [`AnswerComposer`] - grounding prompt and streamed answer
//! - [`RagPipeline`] - all of the above behind one builder
//!
//! ## Backends
//!
//! | Feature | Module | Provides |
//! |---------|--------|----------|
//! | `ollama` (default) | [`ollama`] | `OllamaEmbeddingProvider`, `OllamaChatModel` |
//! | `scylla` | `scylladb` | `ScyllaVectorStore` |
//! | - | [`inmemory`] | [`InMemoryVectorStore`] |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use scylla_rag::{DirectoryLoader, InMemoryVectorStore, OllamaConfig, RagConfig, RagPipeline};
//! use scylla_rag::ollama::{OllamaChatModel, OllamaEmbeddingProvider};
//!
//! let ollama = OllamaConfig::default();
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(OllamaEmbeddingProvider::new(&ollama)))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .chat_model(Arc::new(OllamaChatModel::new(&ollama)))
//!     .build()?;
//!
//! pipeline.create_collection("docs").await?;
//! pipeline.ingest("docs", &DirectoryLoader::new("docs").load().await?).await?;
//! let answer = pipeline.answer("docs", "How do I create a keyspace?").await?;
//! ```

pub mod chunking;
pub mod composer;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod inmemory;
pub mod loader;
pub mod model;
#[cfg(feature = "ollama")]
pub mod ollama;
pub mod pipeline;
pub mod retriever;
#[cfg(feature = "scylla")]
pub mod scylladb;
pub mod vectorstore;

pub use chunking::{
    Chunker, MarkdownChunker, SemanticDoubleMergeChunker, SentenceSplitter, build_chunker,
    chunk_documents,
};
pub use composer::{
    AnswerComposer, Delivery, deliver, failure_marker, grounding_prompt, write_retrieved,
};
pub use config::{
    ChunkStrategy, ChunkingConfig, FailurePolicy, OllamaConfig, RagConfig, RagConfigBuilder,
    StoreConfig,
};
pub use document::{Chunk, Document, DocumentFormat, Record, RetrievedChunk};
pub use embedding::{EmbeddingProvider, cosine_similarity, ensure_dimensions};
pub use error::{RagError, Result, Stage};
pub use indexer::{IndexFailure, IndexReport, Indexer};
pub use inmemory::InMemoryVectorStore;
pub use loader::DirectoryLoader;
pub use model::{ChatMessage, ChatModel, Role, TokenStream};
#[cfg(feature = "ollama")]
pub use ollama::{OllamaChatModel, OllamaEmbeddingProvider};
pub use pipeline::{Answer, RagPipeline, RagPipelineBuilder};
pub use retriever::Retriever;
#[cfg(feature = "scylla")]
pub use scylladb::ScyllaVectorStore;
pub use vectorstore::VectorStore;

//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`MarkdownChunker`]: structural, one chunk per markdown section
//! - [`SemanticDoubleMergeChunker`]: sentence-level merging gated by embedding similarity
//!
//! Use [`build_chunker`] to materialise the strategy named in a [`ChunkingConfig`].

mod markdown;
mod semantic;
mod sentence;
mod split;

use std::sync::Arc;

use async_trait::async_trait;

pub use markdown::MarkdownChunker;
pub use semantic::SemanticDoubleMergeChunker;
pub use sentence::SentenceSplitter;

use crate::config::{ChunkStrategy, ChunkingConfig};
use crate::document::{Chunk, Document};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;

/// A strategy for splitting documents into chunks.
///
/// Implementations produce ordered [`Chunk`]s whose `ordinal` restarts at zero
/// for every document. Output is deterministic for identical input.
#[async_trait]
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no non-whitespace text.
    async fn chunk(&self, document: &Document) -> Result<Vec<Chunk>>;
}

/// Chunk `documents` in order, concatenating their chunks.
pub async fn chunk_documents(chunker: &dyn Chunker, documents: &[Document]) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    for document in documents {
        chunks.extend(chunker.chunk(document).await?);
    }
    Ok(chunks)
}

/// Build the chunker selected by `config.strategy`.
///
/// The embedder is only used by the semantic strategy.
pub fn build_chunker(
    config: &ChunkingConfig,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Arc<dyn Chunker> {
    match config.strategy {
        ChunkStrategy::Markdown => Arc::new(MarkdownChunker::new(config.max_chunk_size)),
        ChunkStrategy::SemanticDoubleMerge => {
            Arc::new(SemanticDoubleMergeChunker::new(embedder, config.clone()))
        }
    }
}

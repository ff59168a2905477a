//! Error types for the `scylla-rag` crate.

use std::fmt;

use thiserror::Error;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Sentence segmentation or chunk merging could not proceed.
    #[error("Chunking error: {0}")]
    ChunkingError(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector store rejected a record insertion.
    #[error("Index write error ({backend}): {message}")]
    IndexWriteError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A similarity search failed or the collection holds no records.
    #[error("Retrieval error ({backend}): {message}")]
    RetrievalError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The assembled grounding prompt exceeds the model's input limit.
    #[error("Context too large for model {model}: {message}")]
    ContextTooLarge {
        /// The language model that refused the prompt.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector store is unreachable or refused the credentials.
    #[error("Connection error ({backend}): {message}")]
    ConnectionError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The language model failed before or during streaming.
    #[error("Generation error ({model}): {message}")]
    GenerationError {
        /// The language model that produced the error.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A source document could not be read.
    #[error("Failed to load document {path}: {message}")]
    DocumentLoadError {
        /// Path of the offending file or directory.
        path: String,
        /// A description of the failure.
        message: String,
    },
}

impl RagError {
    /// The pipeline stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::ChunkingError(_) => Stage::Chunking,
            Self::EmbeddingError { .. } => Stage::Embedding,
            Self::IndexWriteError { .. } => Stage::Indexing,
            Self::RetrievalError { .. } => Stage::Retrieval,
            Self::ContextTooLarge { .. } | Self::GenerationError { .. } => Stage::Generation,
            Self::ConnectionError { .. } => Stage::Connection,
            Self::ConfigError(_) => Stage::Configuration,
            Self::DocumentLoadError { .. } => Stage::Loading,
        }
    }

    /// Whether the error must abort the current operation regardless of
    /// the configured failure policy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectionError { .. })
    }
}

/// Pipeline stage names used in user-facing failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Chunking,
    Embedding,
    Indexing,
    Retrieval,
    Generation,
    Connection,
    Configuration,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loading => "loading",
            Self::Chunking => "chunking",
            Self::Embedding => "embedding",
            Self::Indexing => "indexing",
            Self::Retrieval => "retrieval",
            Self::Generation => "generation",
            Self::Connection => "connection",
            Self::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_identify_the_failing_step() {
        let err = RagError::RetrievalError {
            backend: "InMemory".into(),
            message: "collection 'docs' is empty".into(),
        };
        assert_eq!(err.stage(), Stage::Retrieval);
        assert_eq!(err.stage().to_string(), "retrieval");

        let err = RagError::ContextTooLarge { model: "llama".into(), message: "too big".into() };
        assert_eq!(err.stage().to_string(), "generation");
    }

    #[test]
    fn only_connection_errors_are_fatal() {
        let conn = RagError::ConnectionError { backend: "ScyllaDB".into(), message: "down".into() };
        let write = RagError::IndexWriteError { backend: "ScyllaDB".into(), message: "timeout".into() };
        assert!(conn.is_fatal());
        assert!(!write.is_fatal());
    }
}

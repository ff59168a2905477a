//! Configuration for the RAG pipeline and its external collaborators.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Which chunking strategy the pipeline uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// One chunk per markdown section.
    Markdown,
    /// Sentence-level semantic double merging.
    #[default]
    SemanticDoubleMerge,
}

/// How the indexer reacts when a single chunk cannot be embedded or stored.
///
/// Connection errors abort indexing under either policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failed chunk and return its error.
    FailFast,
    /// Record the failure in the report and continue with the next chunk.
    #[default]
    BestEffort,
}

/// Parameters for the chunkers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub strategy: ChunkStrategy,
    /// Similarity a sentence must exceed to join the running chunk.
    pub initial_threshold: f32,
    /// Similarity at which a following chunk's leading sentence is absorbed.
    pub appending_threshold: f32,
    /// Similarity at which neighbouring chunks are merged.
    pub merging_threshold: f32,
    /// Maximum chunk size in characters.
    pub max_chunk_size: usize,
    /// How many chunks ahead the merging pass may look (1 or 2).
    pub merging_range: usize,
    /// Language used for sentence segmentation.
    pub language: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::default(),
            initial_threshold: 0.4,
            appending_threshold: 0.5,
            merging_threshold: 0.5,
            max_chunk_size: 2048,
            merging_range: 1,
            language: "english".to_string(),
        }
    }
}

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    pub chunking: ChunkingConfig,
    /// Number of top results to return from vector search.
    pub top_k: usize,
    /// Minimum similarity score for results. `None` keeps every result.
    pub min_score: Option<f32>,
    /// Per-chunk failure handling during indexing.
    pub failure_policy: FailurePolicy,
    /// Number of chunks embedded per embedding call during indexing.
    pub embed_batch_size: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            top_k: 5,
            min_score: None,
            failure_policy: FailurePolicy::default(),
            embed_batch_size: 1,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `top_k == 0`
    /// - any threshold lies outside `[-1.0, 1.0]`
    /// - `max_chunk_size == 0`
    /// - `merging_range` is not 1 or 2
    /// - `embed_batch_size == 0`
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        let chunking = &self.chunking;
        for (name, value) in [
            ("initial_threshold", chunking.initial_threshold),
            ("appending_threshold", chunking.appending_threshold),
            ("merging_threshold", chunking.merging_threshold),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(RagError::ConfigError(format!(
                    "{name} ({value}) must lie within [-1.0, 1.0]"
                )));
            }
        }
        if chunking.max_chunk_size == 0 {
            return Err(RagError::ConfigError(
                "max_chunk_size must be greater than zero".to_string(),
            ));
        }
        if !(1..=2).contains(&chunking.merging_range) {
            return Err(RagError::ConfigError(format!(
                "merging_range ({}) must be 1 or 2",
                chunking.merging_range
            )));
        }
        if self.embed_batch_size == 0 {
            return Err(RagError::ConfigError(
                "embed_batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the chunking strategy.
    pub fn strategy(mut self, strategy: ChunkStrategy) -> Self {
        self.config.chunking.strategy = strategy;
        self
    }

    /// Set the sentence-to-chunk similarity threshold.
    pub fn initial_threshold(mut self, threshold: f32) -> Self {
        self.config.chunking.initial_threshold = threshold;
        self
    }

    /// Set the boundary-smoothing similarity threshold.
    pub fn appending_threshold(mut self, threshold: f32) -> Self {
        self.config.chunking.appending_threshold = threshold;
        self
    }

    /// Set the chunk-to-chunk similarity threshold.
    pub fn merging_threshold(mut self, threshold: f32) -> Self {
        self.config.chunking.merging_threshold = threshold;
        self
    }

    /// Set the maximum chunk size in characters.
    pub fn max_chunk_size(mut self, size: usize) -> Self {
        self.config.chunking.max_chunk_size = size;
        self
    }

    /// Set how far ahead the merging pass looks.
    pub fn merging_range(mut self, range: usize) -> Self {
        self.config.chunking.merging_range = range;
        self
    }

    /// Set the segmentation language.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.chunking.language = language.into();
        self
    }

    /// Set the number of top results to return from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Drop search results scoring below `score`.
    pub fn min_score(mut self, score: f32) -> Self {
        self.config.min_score = Some(score);
        self
    }

    /// Set the indexing failure policy.
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Set the number of chunks embedded per call while indexing.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Connection settings for a ScyllaDB cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Contact points (host names or addresses, without port).
    pub hosts: Vec<String>,
    pub port: u16,
    /// Local datacenter preferred by the load balancer.
    pub datacenter: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Keyspace the session switches to after connecting.
    pub keyspace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["127.0.0.1".to_string()],
            port: 9042,
            datacenter: None,
            username: None,
            password: None,
            keyspace: "rag".to_string(),
        }
    }
}

/// Settings for the Ollama embedding and chat endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub embedding_model: String,
    pub language_model: String,
    /// Dimensionality of `embedding_model`.
    pub dimensions: usize,
    /// Model input limit in tokens; prompts estimated above it are refused.
    pub context_window: Option<usize>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embedding_model: "hf.co/CompendiumLabs/bge-base-en-v1.5-gguf".to_string(),
            language_model: "hf.co/bartowski/Llama-3.2-1B-Instruct-GGUF".to_string(),
            dimensions: 768,
            context_window: None,
        }
    }
}

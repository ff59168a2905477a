//! Data types for documents, chunks, records, and retrieval results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The markup format of a source [`Document`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Markdown,
    ReStructuredText,
    #[default]
    PlainText,
}

impl DocumentFormat {
    /// Infer the format from a file extension (without the leading dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "markdown" => Self::Markdown,
            "rst" => Self::ReStructuredText,
            _ => Self::PlainText,
        }
    }
}

/// A source document containing text content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Markup format of `text`.
    #[serde(default)]
    pub format: DocumentFormat,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Create a plain-text document with no metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            format: DocumentFormat::PlainText,
            metadata: HashMap::new(),
            source_uri: None,
        }
    }

    /// Set the markup format.
    pub fn with_format(mut self, format: DocumentFormat) -> Self {
        self.format = format;
        self
    }
}

/// A contiguous span of one [`Document`], produced by a chunker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Identifier of the form `{document_id}_{ordinal}`.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Position of this chunk within its document.
    pub ordinal: usize,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Key-value metadata inherited from the parent document plus chunk-specific fields.
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    pub(crate) fn from_document(document: &Document, ordinal: usize, text: String) -> Self {
        let mut metadata = document.metadata.clone();
        metadata.insert("chunk_index".to_string(), ordinal.to_string());
        Self {
            id: format!("{}_{ordinal}", document.id),
            text,
            ordinal,
            document_id: document.id.clone(),
            metadata,
        }
    }

    /// Size of the chunk in characters.
    pub fn size(&self) -> usize {
        self.text.chars().count()
    }
}

/// The unit persisted in a vector store collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Unique identifier generated at indexing time.
    pub id: Uuid,
    /// The chunk text.
    pub text: String,
    /// The chunk embedding.
    pub embedding: Vec<f32>,
    /// Target collection name.
    pub collection: String,
}

/// A stored record returned by similarity search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    /// Identifier of the matching [`Record`].
    pub id: Uuid,
    /// The record text.
    pub text: String,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}

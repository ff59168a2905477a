//! Deterministic embedders and chat models shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use scylla_rag::{ChatMessage, ChatModel, EmbeddingProvider, RagError, Result, TokenStream};

/// Pseudo-random but stable embeddings: every dimension hashes `(text, i)`.
///
/// Identical texts map to identical vectors; different texts are nearly
/// orthogonal for reasonable dimensions.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

fn fnv1a(bytes: &[u8], seed: u64) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325_u64 ^ seed.wrapping_mul(0x9e37_79b9_7f4a_7c15);
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok((0..self.dimensions)
            .map(|i| {
                let hash = fnv1a(text.as_bytes(), i as u64);
                // top 24 bits map exactly onto [-1.0, 1.0]
                ((hash >> 40) as f32 / ((1u64 << 24) - 1) as f32) * 2.0 - 1.0
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Bag-of-words embedder over two topics: animals and finance.
///
/// Dimension 0 counts animal words, dimension 1 finance words, and dimension 2
/// holds a small constant plus a share of every other word.
pub struct TopicEmbedder;

const ANIMAL: &[&str] = &["cat", "cats", "dog", "dogs", "pet", "pets", "sat", "ran", "animal"];
const FINANCE: &[&str] = &["stock", "stocks", "market", "fell", "price", "shares", "bank"];

#[async_trait]
impl EmbeddingProvider for TopicEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0, 0.0, 0.1];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let word = word.to_lowercase();
            if ANIMAL.contains(&word.as_str()) {
                vector[0] += 1.0;
            } else if FINANCE.contains(&word.as_str()) {
                vector[1] += 1.0;
            } else {
                vector[2] += 0.1;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        3
    }
}

/// Looks sentences up in a fixed table; unknown text is an embedding error.
pub struct ScriptedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    dimensions: usize,
}

impl ScriptedEmbedder {
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, Vec<f32>)>) -> Self {
        let vectors: HashMap<String, Vec<f32>> =
            entries.into_iter().map(|(text, v)| (text.to_string(), v)).collect();
        let dimensions = vectors.values().next().map_or(0, Vec::len);
        Self { vectors, dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.vectors.get(text).cloned().ok_or_else(|| RagError::EmbeddingError {
            provider: "scripted".into(),
            message: format!("no vector scripted for {text:?}"),
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A chat model that replays fixed fragments and records the messages it saw.
pub struct MockChatModel {
    fragments: Vec<String>,
    failure: Option<String>,
    pub seen: Mutex<Vec<ChatMessage>>,
}

impl MockChatModel {
    pub fn replying(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            failure: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Replay `fragments`, then fail with a generation error.
    pub fn failing_after(fragments: &[&str], reason: &str) -> Self {
        Self { failure: Some(reason.to_string()), ..Self::replying(fragments) }
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<TokenStream> {
        self.seen.lock().unwrap().extend_from_slice(messages);
        let mut items: Vec<Result<String>> = self.fragments.iter().cloned().map(Ok).collect();
        if let Some(reason) = &self.failure {
            items.push(Err(RagError::GenerationError {
                model: "mock".into(),
                message: reason.clone(),
            }));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

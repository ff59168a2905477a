//! Semantic double-merge chunking.
//!
//! Sentences are embedded once and then reduced in three passes over the
//! ordered sentence sequence:
//!
//! 1. **initial**: grow a chunk while the next sentence is similar to the
//!    running chunk embedding (`> initial_threshold`);
//! 2. **appending**: move the leading sentence of the following chunk back
//!    into the current chunk when it is similar enough
//!    (`>= appending_threshold`);
//! 3. **merging**: merge neighbouring chunks whose embeddings are similar
//!    (`>= merging_threshold`), repeating full scans until a fixed point.
//!
//! A chunk's embedding is the centroid of its sentence embeddings. Every
//! pass respects `max_chunk_size`, counted in characters with a single space
//! joining sentences.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::Chunker;
use super::sentence::SentenceSplitter;
use super::split::{char_len, split_to_fit};
use crate::config::ChunkingConfig;
use crate::document::{Chunk, Document};
use crate::embedding::{EmbeddingProvider, cosine_similarity, ensure_dimensions};
use crate::error::{RagError, Result};

/// Splits documents into semantically self-contained chunks.
///
/// # Example
///
/// ```rust,ignore
/// use scylla_rag::{ChunkingConfig, SemanticDoubleMergeChunker};
///
/// let chunker = SemanticDoubleMergeChunker::new(embedder.clone(), ChunkingConfig::default());
/// let chunks = chunker.chunk(&document).await?;
/// ```
pub struct SemanticDoubleMergeChunker {
    embedder: Arc<dyn EmbeddingProvider>,
    config: ChunkingConfig,
}

impl SemanticDoubleMergeChunker {
    /// Create a chunker that measures similarity with `embedder`.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, config: ChunkingConfig) -> Self {
        Self { embedder, config }
    }

    /// Segment `text` into sentences no longer than `max_chunk_size`.
    fn sentences(&self, text: &str) -> Result<Vec<String>> {
        let splitter = SentenceSplitter::new(&self.config.language)?;
        let max = self.config.max_chunk_size;
        Ok(splitter.split(text).into_iter().flat_map(|s| split_to_fit(&s, max, &[" "])).collect())
    }

    async fn embed_sentences(&self, texts: Vec<String>) -> Result<Vec<Sentence>> {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let embeddings = self.embedder.embed_batch(&refs).await?;
        if embeddings.len() != texts.len() {
            return Err(RagError::ChunkingError(format!(
                "embedder returned {} vectors for {} sentences",
                embeddings.len(),
                texts.len()
            )));
        }

        let dimensions = self.embedder.dimensions();
        texts
            .into_iter()
            .zip(embeddings)
            .map(|(text, embedding)| {
                ensure_dimensions("sentence embedder", &embedding, dimensions)?;
                Ok(Sentence { size: char_len(&text), text, embedding })
            })
            .collect()
    }
}

#[async_trait]
impl Chunker for SemanticDoubleMergeChunker {
    async fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        let texts = self.sentences(&document.text)?;
        if texts.len() <= 1 {
            return Ok(texts
                .into_iter()
                .map(|text| Chunk::from_document(document, 0, text))
                .collect());
        }

        let sentence_count = texts.len();
        let sentences = self.embed_sentences(texts).await?;
        let thresholds = Thresholds::from(&self.config);

        let spans = initial_pass(&sentences, &thresholds);
        let initial = spans.len();
        let spans = appending_pass(&sentences, spans, &thresholds);
        let spans = merging_pass(spans, &thresholds);

        debug!(
            document.id = %document.id,
            sentence_count,
            initial_chunks = initial,
            final_chunks = spans.len(),
            "double-merge chunking complete"
        );

        Ok(spans
            .iter()
            .enumerate()
            .map(|(ordinal, span)| Chunk::from_document(document, ordinal, span.text(&sentences)))
            .collect())
    }
}

#[derive(Debug, Clone)]
struct Sentence {
    text: String,
    size: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Copy)]
struct Thresholds {
    initial: f32,
    appending: f32,
    merging: f32,
    max_size: usize,
    merging_range: usize,
}

impl From<&ChunkingConfig> for Thresholds {
    fn from(config: &ChunkingConfig) -> Self {
        Self {
            initial: config.initial_threshold,
            appending: config.appending_threshold,
            merging: config.merging_threshold,
            max_size: config.max_chunk_size,
            merging_range: config.merging_range,
        }
    }
}

/// A run of consecutive sentences with its size and summed embedding.
#[derive(Debug, Clone)]
struct Span {
    members: Vec<usize>,
    size: usize,
    // cosine is scale-invariant, so the sum stands in for the centroid
    sum: Vec<f32>,
}

impl Span {
    fn start(index: usize, sentences: &[Sentence]) -> Self {
        let sentence = &sentences[index];
        Self { members: vec![index], size: sentence.size, sum: sentence.embedding.clone() }
    }

    fn fits(&self, extra: usize, max_size: usize) -> bool {
        self.size + 1 + extra <= max_size
    }

    fn similarity(&self, embedding: &[f32]) -> f32 {
        cosine_similarity(&self.sum, embedding)
    }

    fn push(&mut self, index: usize, sentences: &[Sentence]) {
        let sentence = &sentences[index];
        self.members.push(index);
        self.size += 1 + sentence.size;
        add_into(&mut self.sum, &sentence.embedding);
    }

    fn pop_front(&mut self, sentences: &[Sentence]) {
        self.members.remove(0);
        self.size = self.members.iter().map(|&i| sentences[i].size).sum::<usize>()
            + self.members.len().saturating_sub(1);
        self.sum = vec![0.0; self.sum.len()];
        for &i in &self.members {
            add_into(&mut self.sum, &sentences[i].embedding);
        }
    }

    fn absorb(&mut self, other: Span) {
        self.members.extend(other.members);
        self.size += 1 + other.size;
        add_into(&mut self.sum, &other.sum);
    }

    fn text(&self, sentences: &[Sentence]) -> String {
        self.members.iter().map(|&i| sentences[i].text.as_str()).collect::<Vec<_>>().join(" ")
    }
}

fn add_into(acc: &mut [f32], v: &[f32]) {
    for (a, x) in acc.iter_mut().zip(v) {
        *a += x;
    }
}

fn initial_pass(sentences: &[Sentence], t: &Thresholds) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut current = Span::start(0, sentences);

    for (index, sentence) in sentences.iter().enumerate().skip(1) {
        if current.similarity(&sentence.embedding) > t.initial
            && current.fits(sentence.size, t.max_size)
        {
            current.push(index, sentences);
        } else {
            spans.push(std::mem::replace(&mut current, Span::start(index, sentences)));
        }
    }

    spans.push(current);
    spans
}

fn appending_pass(sentences: &[Sentence], mut spans: Vec<Span>, t: &Thresholds) -> Vec<Span> {
    let mut i = 0;
    while i + 1 < spans.len() {
        let lead = spans[i + 1].members[0];
        let sentence = &sentences[lead];
        if spans[i].similarity(&sentence.embedding) >= t.appending
            && spans[i].fits(sentence.size, t.max_size)
        {
            spans[i].push(lead, sentences);
            spans[i + 1].pop_front(sentences);
            if spans[i + 1].members.is_empty() {
                // the boundary moved; test the new neighbour from the same chunk
                spans.remove(i + 1);
                continue;
            }
        }
        i += 1;
    }
    spans
}

fn merging_pass(mut spans: Vec<Span>, t: &Thresholds) -> Vec<Span> {
    loop {
        let mut merged = false;
        let mut i = 0;
        while i + 1 < spans.len() {
            let next = &spans[i + 1];
            if spans[i].similarity(&next.sum) >= t.merging && spans[i].fits(next.size, t.max_size) {
                let next = spans.remove(i + 1);
                spans[i].absorb(next);
                merged = true;
                continue;
            }

            if t.merging_range >= 2 && i + 2 < spans.len() {
                let (middle, far) = (&spans[i + 1], &spans[i + 2]);
                if spans[i].similarity(&far.sum) >= t.merging
                    && spans[i].size + 1 + middle.size + 1 + far.size <= t.max_size
                {
                    let middle = spans.remove(i + 1);
                    let far = spans.remove(i + 1);
                    spans[i].absorb(middle);
                    spans[i].absorb(far);
                    merged = true;
                    continue;
                }
            }

            i += 1;
        }

        if !merged {
            return spans;
        }
    }
}

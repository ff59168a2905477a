//! Grounded answer generation.
//!
//! [`AnswerComposer`] turns a question and its retrieved chunks into a chat
//! request, and [`deliver`] streams the reply into any [`AsyncWrite`] sink.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::document::RetrievedChunk;
use crate::error::{RagError, Result};
use crate::model::{ChatMessage, ChatModel, TokenStream};

const PREAMBLE: &str = "You are a helpful AI assistant chatbot.";
const INSTRUCTION: &str =
    "Use the provided context as knowledge base to form the best answer you can.";

/// Build the system prompt that grounds the model in `chunks`.
///
/// Chunks appear as numbered `Item` blocks in rank order. Nothing is truncated.
pub fn grounding_prompt(chunks: &[RetrievedChunk]) -> String {
    let mut prompt = format!("{PREAMBLE}\n\nContext:");
    for (i, chunk) in chunks.iter().enumerate() {
        let _ = write!(prompt, "\n\n Item {}: {}", i + 1, chunk.text);
    }
    let _ = write!(prompt, "\n\n{INSTRUCTION}\n");
    prompt
}

/// Generates answers grounded in retrieved chunks.
///
/// # Example
///
/// ```rust,ignore
/// use scylla_rag::{AnswerComposer, deliver};
///
/// let composer = AnswerComposer::new(model).with_diagnostics("prompt.txt");
/// let stream = composer.compose("What is ScyllaDB?", &chunks).await?;
/// deliver(stream, &mut tokio::io::stdout(), &CancellationToken::new()).await?;
/// ```
pub struct AnswerComposer {
    model: Arc<dyn ChatModel>,
    diagnostics: Option<PathBuf>,
}

impl AnswerComposer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model, diagnostics: None }
    }

    /// Write the prompt and retrieved chunks to `path` before each generation.
    ///
    /// Failing to write the file is logged and does not stop generation.
    pub fn with_diagnostics(mut self, path: impl Into<PathBuf>) -> Self {
        self.diagnostics = Some(path.into());
        self
    }

    /// The messages sent to the model: the grounding prompt, then the question.
    pub fn messages(query: &str, chunks: &[RetrievedChunk]) -> Vec<ChatMessage> {
        vec![ChatMessage::system(grounding_prompt(chunks)), ChatMessage::user(query)]
    }

    /// Start generating an answer to `query` grounded in `chunks`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ContextTooLarge`] or [`RagError::GenerationError`]
    /// when the model refuses the request before producing any output.
    #[instrument(name = "rag.compose", skip_all, fields(model = %self.model.name(), chunk_count = chunks.len()))]
    pub async fn compose(&self, query: &str, chunks: &[RetrievedChunk]) -> Result<TokenStream> {
        let messages = Self::messages(query, chunks);

        if let Some(path) = &self.diagnostics {
            if let Err(e) = write_diagnostics(path, &messages[0].content, chunks).await {
                warn!(path = %path.display(), error = %e, "failed to write diagnostics");
            }
        }

        debug!(prompt_chars = messages[0].content.chars().count(), "sending grounding prompt");
        self.model.chat_stream(&messages).await.map_err(|e| {
            error!(error = %e, "generation failed to start");
            e
        })
    }
}

async fn write_diagnostics(
    path: &Path,
    prompt: &str,
    chunks: &[RetrievedChunk],
) -> std::io::Result<()> {
    let mut out = format!("=== prompt ===\n{prompt}\n=== retrieved chunks ===\n");
    for (i, chunk) in chunks.iter().enumerate() {
        let _ = write!(out, "\n[{}] id={} score={:.4}\n{}\n", i + 1, chunk.id, chunk.score, chunk.text);
    }
    tokio::fs::write(path, out).await
}

/// Write chunk texts to `path`, each followed by a `---` rule.
pub async fn write_retrieved(path: impl AsRef<Path>, chunks: &[RetrievedChunk]) -> std::io::Result<()> {
    let body: String = chunks.iter().map(|c| format!("{}\n\n---\n\n ", c.text)).collect();
    tokio::fs::write(path, body).await
}

/// Outcome of [`deliver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Fragments written to the sink.
    pub fragments: usize,
    /// Whether delivery stopped because the token was cancelled.
    pub cancelled: bool,
}

/// Text written to the sink when generation fails mid-stream.
pub fn failure_marker(error: &RagError) -> String {
    format!("\n[generation failed: {error}]\n")
}

/// Copy fragments from `stream` into `sink` as they arrive.
///
/// Stops early when `cancel` fires, keeping what was already written. A
/// failed fragment writes [`failure_marker`] to the sink before its error is
/// returned, so partial output is never mistaken for a complete answer.
///
/// # Errors
///
/// Returns the stream's error, or [`RagError::GenerationError`] if the sink
/// rejects a write.
pub async fn deliver<W>(
    mut stream: TokenStream,
    sink: &mut W,
    cancel: &CancellationToken,
) -> Result<Delivery>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut delivery = Delivery::default();
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                delivery.cancelled = true;
                break;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(fragment)) => {
                write_fragment(sink, &fragment).await?;
                delivery.fragments += 1;
            }
            Some(Err(e)) => {
                error!(error = %e, fragments = delivery.fragments, "generation failed mid-stream");
                write_fragment(sink, &failure_marker(&e)).await?;
                return Err(e);
            }
            None => break,
        }
    }

    info!(fragments = delivery.fragments, cancelled = delivery.cancelled, "answer delivered");
    Ok(delivery)
}

async fn write_fragment<W>(sink: &mut W, text: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let to_error = |e: std::io::Error| RagError::GenerationError {
        model: "output".to_string(),
        message: format!("failed to write answer: {e}"),
    };
    sink.write_all(text.as_bytes()).await.map_err(to_error)?;
    sink.flush().await.map_err(to_error)
}

//! Ollama embedding and chat backends over the Ollama HTTP API.
//!
//! This module is only available when the `ollama` feature is enabled.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::OllamaConfig;
use crate::embedding::{EmbeddingProvider, ensure_dimensions};
use crate::error::{RagError, Result};
use crate::model::{ChatMessage, ChatModel, TokenStream};

const PROVIDER: &str = "Ollama";

/// Rough characters-per-token ratio used to estimate prompt size.
const CHARS_PER_TOKEN: usize = 4;

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

/// Extract the `error` field Ollama puts in failure bodies, or the raw body.
fn error_detail(body: String) -> String {
    serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body)
}

/// Whether an Ollama error message reports an oversized prompt.
fn mentions_context_limit(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    ["context length", "context window", "context size", "num_ctx"]
        .iter()
        .any(|needle| message.contains(needle))
        || (message.contains("exceed") && message.contains("context"))
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Serialize)]
struct ChatOptions {
    num_ctx: usize,
}

#[derive(Deserialize)]
struct ChatFrame {
    #[serde(default)]
    message: Option<FrameMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct FrameMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by Ollama's `/api/embed` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use scylla_rag::{OllamaConfig, ollama::OllamaEmbeddingProvider};
///
/// let provider = OllamaEmbeddingProvider::new(&OllamaConfig::default());
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), 768);
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for `config.embedding_model`.
    pub fn new(config: &OllamaConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: endpoint(&config.base_url, "api/embed"),
            model: config.embedding_model.clone(),
            dimensions: config.dimensions,
        }
    }

    fn error(message: String) -> RagError {
        RagError::EmbeddingError { provider: PROVIDER.into(), message }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| Self::error("API returned no embeddings".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let response = self
            .client
            .post(&self.url)
            .json(&EmbedRequest { model: &self.model, input: texts })
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                Self::error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = error_detail(response.text().await.unwrap_or_default());
            error!(provider = PROVIDER, %status, "API error");
            return Err(Self::error(format!("API returned {status}: {detail}")));
        }

        let body: EmbedResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            Self::error(format!("failed to parse response: {e}"))
        })?;

        if body.embeddings.len() != texts.len() {
            return Err(Self::error(format!(
                "requested {} embeddings, received {}",
                texts.len(),
                body.embeddings.len()
            )));
        }
        for embedding in &body.embeddings {
            ensure_dimensions(PROVIDER, embedding, self.dimensions)?;
        }
        Ok(body.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ── Chat ───────────────────────────────────────────────────────────

/// A [`ChatModel`] backed by Ollama's streaming `/api/chat` endpoint.
///
/// When `context_window` is configured it is sent as `num_ctx`, and prompts
/// estimated above it are refused locally with [`RagError::ContextTooLarge`].
pub struct OllamaChatModel {
    client: reqwest::Client,
    url: String,
    model: String,
    context_window: Option<usize>,
}

impl OllamaChatModel {
    /// Create a chat model for `config.language_model`.
    pub fn new(config: &OllamaConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: endpoint(&config.base_url, "api/chat"),
            model: config.language_model.clone(),
            context_window: config.context_window,
        }
    }

    fn check_context(&self, messages: &[ChatMessage]) -> Result<()> {
        let Some(limit) = self.context_window else {
            return Ok(());
        };
        let chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
        let estimated = chars.div_ceil(CHARS_PER_TOKEN);
        if estimated > limit {
            return Err(RagError::ContextTooLarge {
                model: self.model.clone(),
                message: format!("prompt is about {estimated} tokens, context window is {limit}"),
            });
        }
        Ok(())
    }
}

/// Classify an error message reported by the model server.
fn model_error(model: &str, message: String) -> RagError {
    if mentions_context_limit(&message) {
        RagError::ContextTooLarge { model: model.to_string(), message }
    } else {
        RagError::GenerationError { model: model.to_string(), message }
    }
}

/// Decode one NDJSON frame into a text fragment, skipping empty ones.
fn parse_frame(model: &str, line: &[u8]) -> Result<Option<String>> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let frame: ChatFrame = serde_json::from_str(line).map_err(|e| RagError::GenerationError {
        model: model.to_string(),
        message: format!("malformed stream frame: {e}"),
    })?;
    if let Some(message) = frame.error {
        return Err(model_error(model, message));
    }
    Ok(frame.message.map(|m| m.content).filter(|content| !content.is_empty()))
}

#[async_trait]
impl ChatModel for OllamaChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<TokenStream> {
        self.check_context(messages)?;

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: true,
            options: self.context_window.map(|num_ctx| ChatOptions { num_ctx }),
        };

        debug!(provider = PROVIDER, model = %self.model, message_count = messages.len(), "starting chat");
        let response = self.client.post(&self.url).json(&request).send().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "request failed");
            RagError::GenerationError {
                model: self.model.clone(),
                message: format!("request failed: {e}"),
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = error_detail(response.text().await.unwrap_or_default());
            error!(provider = PROVIDER, %status, "API error");
            return Err(model_error(&self.model, format!("API returned {status}: {detail}")));
        }

        let model = self.model.clone();
        let mut bytes = response.bytes_stream();
        let stream = try_stream! {
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(piece) = bytes.next().await {
                let piece = piece.map_err(|e| RagError::GenerationError {
                    model: model.clone(),
                    message: format!("stream interrupted: {e}"),
                })?;
                buffer.extend_from_slice(&piece);

                while let Some(end) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=end).collect();
                    if let Some(fragment) = parse_frame(&model, &line)? {
                        yield fragment;
                    }
                }
            }
            if let Some(fragment) = parse_frame(&model, &buffer)? {
                yield fragment;
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_yield_non_empty_content() {
        let frame = br#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#;
        assert_eq!(parse_frame("m", frame).unwrap(), Some("Hel".to_string()));

        let done = br#"{"message":{"role":"assistant","content":""},"done":true}"#;
        assert_eq!(parse_frame("m", done).unwrap(), None);
        assert_eq!(parse_frame("m", b"  \n").unwrap(), None);
    }

    #[test]
    fn error_frames_are_classified() {
        let err = parse_frame("m", br#"{"error":"model runner crashed"}"#).unwrap_err();
        assert!(matches!(err, RagError::GenerationError { .. }));

        let err =
            parse_frame("m", br#"{"error":"input length exceeds the context length"}"#).unwrap_err();
        assert!(matches!(err, RagError::ContextTooLarge { .. }));
    }

    #[test]
    fn oversized_prompts_are_refused_before_sending() {
        let config = OllamaConfig { context_window: Some(10), ..OllamaConfig::default() };
        let model = OllamaChatModel::new(&config);
        let err = model.check_context(&[ChatMessage::user("x".repeat(41))]).unwrap_err();
        assert!(matches!(err, RagError::ContextTooLarge { .. }));
        assert!(model.check_context(&[ChatMessage::user("x".repeat(40))]).is_ok());
    }

    #[test]
    fn endpoints_ignore_trailing_slashes() {
        assert_eq!(endpoint("http://host:11434/", "api/chat"), "http://host:11434/api/chat");
    }
}

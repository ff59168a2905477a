//! Chat model abstraction used for answer generation.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An ordered, non-restartable stream of generated text fragments.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// The author of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A language model that answers a conversation with streamed text.
///
/// Errors raised before the first fragment (unreachable model, refused
/// prompt) are returned from [`chat_stream`](ChatModel::chat_stream) itself.
/// Errors raised mid-generation arrive as an `Err` item on the stream.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Start generating a reply to `messages`.
    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<TokenStream>;
}

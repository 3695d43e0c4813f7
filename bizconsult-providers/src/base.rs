//! Base trait for conversation providers

use async_trait::async_trait;
use bizconsult_core::persona;
use bizconsult_core::session::Message;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;
use thiserror::Error;

/// Error type for provider operations
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Lazy sequence of reply text fragments, consumed once in order
pub type ReplyStream = Pin<Box<dyn Stream<Item = ProviderResult<String>> + Send>>;

/// Trait for conversation providers
#[async_trait]
pub trait ConversationProvider: Send + Sync {
    /// Start a fresh conversation, optionally seeded with prior messages.
    ///
    /// Any previously started conversation context is discarded.
    async fn start_conversation(&self, history: &[Message]) -> ProviderResult<()>;

    /// Request a streamed reply to `text`.
    async fn stream_reply(&self, text: &str) -> ProviderResult<ReplyStream>;

    /// Request a complete reply, draining the stream.
    ///
    /// Falls back to a fixed apology when the model produced no text.
    async fn reply(&self, text: &str) -> ProviderResult<String> {
        let mut stream = self.stream_reply(text).await?;
        let mut full_reply = String::new();
        while let Some(fragment) = stream.next().await {
            full_reply.push_str(&fragment?);
        }

        if full_reply.is_empty() {
            return Ok(persona::FALLBACK_REPLY.to_string());
        }
        Ok(full_reply)
    }
}

//! Deterministic provider replaying scripted replies
//!
//! Used by the store's tests and by the CLI's offline mode, where a real
//! Gemini key is not available.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use bizconsult_core::persona;
use bizconsult_core::session::Message;

use crate::base::{ConversationProvider, ProviderError, ProviderResult, ReplyStream};

/// One scripted reply: fragments to stream, optionally ending in a failure
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    fragments: Vec<String>,
    fail_after: bool,
}

impl ScriptedReply {
    /// Reply that streams `fragments` and completes
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            fail_after: false,
        }
    }

    /// Reply that streams `fragments` and then fails
    pub fn failure_after<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            fail_after: true,
        }
    }
}

/// Provider that pops one scripted reply per request
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<ScriptedReply>>,
    /// Histories passed to start_conversation, oldest first
    started_with: Mutex<Vec<Vec<Message>>>,
    /// Texts passed to stream_reply, oldest first
    sent: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = ScriptedReply>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Queue another reply
    pub fn push_reply(&self, reply: ScriptedReply) {
        self.lock(&self.replies).push_back(reply);
    }

    /// Histories this provider was (re)started with
    pub fn started_histories(&self) -> Vec<Vec<Message>> {
        self.lock(&self.started_with).clone()
    }

    /// Texts this provider was asked to reply to
    pub fn sent_texts(&self) -> Vec<String> {
        self.lock(&self.sent).clone()
    }

    fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ConversationProvider for ScriptedProvider {
    async fn start_conversation(&self, history: &[Message]) -> ProviderResult<()> {
        self.lock(&self.started_with).push(history.to_vec());
        Ok(())
    }

    async fn stream_reply(&self, text: &str) -> ProviderResult<ReplyStream> {
        self.lock(&self.sent).push(text.to_string());

        let reply = self
            .lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| ScriptedReply::fragments([persona::FALLBACK_REPLY]));

        let mut items: Vec<ProviderResult<String>> = reply.fragments.into_iter().map(Ok).collect();
        if reply.fail_after {
            items.push(Err(ProviderError::ApiError(
                "scripted failure".to_string(),
            )));
        }

        Ok(Box::pin(futures::stream::iter(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_streams_fragments_in_order() {
        let provider =
            ScriptedProvider::with_replies([ScriptedReply::fragments(["Hola", " mundo"])]);
        let mut stream = provider.stream_reply("hola").await.unwrap();

        let mut fragments = Vec::new();
        while let Some(item) = stream.next().await {
            fragments.push(item.unwrap());
        }
        assert_eq!(fragments, vec!["Hola".to_string(), " mundo".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_reply_ends_with_error() {
        let provider =
            ScriptedProvider::with_replies([ScriptedReply::failure_after(["Para "])]);
        let mut stream = provider.stream_reply("hola").await.unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), "Para ");
        assert!(matches!(
            stream.next().await.unwrap(),
            Err(ProviderError::ApiError(_))
        ));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_queue_falls_back_to_apology() {
        let provider = ScriptedProvider::new();
        let reply = provider.reply("hola").await.unwrap();
        assert_eq!(reply, persona::FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_reply_collects_full_text() {
        let provider =
            ScriptedProvider::with_replies([ScriptedReply::fragments(["Hola", " mundo"])]);
        let reply = provider.reply("hola").await.unwrap();
        assert_eq!(reply, "Hola mundo");
    }

    #[tokio::test]
    async fn test_records_started_histories_and_sent_texts() {
        let provider = ScriptedProvider::new();
        provider
            .start_conversation(&[Message::model("Bienvenido")])
            .await
            .unwrap();
        let _ = provider.stream_reply("primera consulta").await.unwrap();

        let histories = provider.started_histories();
        assert_eq!(histories.len(), 1);
        assert_eq!(histories[0].len(), 1);
        assert_eq!(provider.sent_texts(), vec!["primera consulta".to_string()]);
    }
}

//! Mid-stream interleavings: switching, deleting, and failing while a
//! reply is still arriving.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use bizconsult_core::persona;
use bizconsult_core::session::Message;
use bizconsult_providers::{ConversationProvider, ProviderError, ProviderResult, ReplyStream};
use bizconsult_store::{SendEvent, SessionStore};

/// Provider whose reply streams are fed by the test one fragment at a
/// time, so store transitions can be interleaved mid-stream.
#[derive(Default)]
struct RemoteControlledProvider {
    pending: Mutex<VecDeque<mpsc::UnboundedReceiver<ProviderResult<String>>>>,
}

impl RemoteControlledProvider {
    /// Queue one reply stream and hand back its feeding end
    fn queue_stream(&self) -> mpsc::UnboundedSender<ProviderResult<String>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(rx);
        tx
    }
}

#[async_trait]
impl ConversationProvider for RemoteControlledProvider {
    async fn start_conversation(&self, _history: &[Message]) -> ProviderResult<()> {
        Ok(())
    }

    async fn stream_reply(&self, _text: &str) -> ProviderResult<ReplyStream> {
        let rx = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .ok_or_else(|| ProviderError::ConfigError("no stream queued".to_string()))?;
        Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }
}

fn controlled_store() -> (SessionStore, Arc<RemoteControlledProvider>) {
    let provider = Arc::new(RemoteControlledProvider::default());
    (SessionStore::new(provider.clone()), provider)
}

#[tokio::test]
async fn test_fragments_follow_originating_session_after_switch() {
    let (store, provider) = controlled_store();
    let original = store.create_session().await;

    let feed = provider.queue_stream();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let send_task = tokio::spawn({
        let store = store.clone();
        async move {
            store
                .send_message("¿Qué KPI debo vigilar?", Some(&event_tx))
                .await
        }
    });

    feed.send(Ok("Los ".to_string())).unwrap();
    let event = event_rx.recv().await.expect("delta event");
    assert!(matches!(event, SendEvent::Delta { ref session_id, .. } if *session_id == original.id));

    // The user opens a new consultation while the reply is arriving
    let fresh = store.create_session().await;
    assert_eq!(store.active_session_id().await, Some(fresh.id.clone()));

    feed.send(Ok("ingresos".to_string())).unwrap();
    drop(feed);
    assert!(send_task.await.unwrap());

    let sessions = store.sessions().await;
    let streamed = sessions.iter().find(|s| s.id == original.id).unwrap();
    assert_eq!(streamed.messages.len(), 3);
    assert_eq!(streamed.messages[2].content, "Los ingresos");

    let untouched = sessions.iter().find(|s| s.id == fresh.id).unwrap();
    assert_eq!(untouched.messages.len(), 1);
    assert!(!store.is_loading().await);
}

#[tokio::test]
async fn test_deleting_streaming_session_drops_remaining_fragments() {
    let (store, provider) = controlled_store();
    let original = store.create_session().await;

    let feed = provider.queue_stream();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let send_task = tokio::spawn({
        let store = store.clone();
        async move {
            store
                .send_message("¿Cómo reduzco el churn?", Some(&event_tx))
                .await
        }
    });

    feed.send(Ok("Para ".to_string())).unwrap();
    let event = event_rx.recv().await.expect("delta event");
    assert!(matches!(event, SendEvent::Delta { .. }));

    // Last session deleted mid-stream; a replacement takes its place
    assert!(store.delete_session(&original.id).await);

    feed.send(Ok("empezar".to_string())).unwrap();
    drop(feed);
    assert!(send_task.await.unwrap());

    let sessions = store.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_ne!(sessions[0].id, original.id);
    assert_eq!(sessions[0].messages.len(), 1);
    assert!(!store.is_loading().await);

    // The dropped fragment produced no event; the send still completed
    let event = event_rx.recv().await.expect("completion event");
    assert!(matches!(event, SendEvent::Completed { ref session_id } if *session_id == original.id));
    assert!(event_rx.recv().await.is_none());
}

#[tokio::test]
async fn test_send_while_loading_is_rejected() {
    let (store, provider) = controlled_store();
    store.create_session().await;

    let feed = provider.queue_stream();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let send_task = tokio::spawn({
        let store = store.clone();
        async move {
            store
                .send_message("¿Cómo valido mi idea?", Some(&event_tx))
                .await
        }
    });

    feed.send(Ok("Primero ".to_string())).unwrap();
    event_rx.recv().await.expect("delta event");
    assert!(store.is_loading().await);

    assert!(!store.send_message("otra consulta", None).await);

    drop(feed);
    assert!(send_task.await.unwrap());

    let session = &store.sessions().await[0];
    assert_eq!(session.messages.len(), 3);
    assert_eq!(session.messages[1].content, "¿Cómo valido mi idea?");
}

#[tokio::test]
async fn test_mid_stream_failure_replaces_partial_and_reports_it() {
    let (store, provider) = controlled_store();
    let session = store.create_session().await;

    let feed = provider.queue_stream();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let send_task = tokio::spawn({
        let store = store.clone();
        async move {
            store
                .send_message("¿Qué margen es sano?", Some(&event_tx))
                .await
        }
    });

    feed.send(Ok("Para ".to_string())).unwrap();
    let event = event_rx.recv().await.expect("delta event");
    assert!(matches!(event, SendEvent::Delta { .. }));

    feed.send(Err(ProviderError::ApiError("boom".to_string())))
        .unwrap();
    assert!(send_task.await.unwrap());

    let stored = &store.sessions().await[0];
    assert_eq!(stored.messages.len(), 3);
    assert_eq!(stored.messages[2].content, persona::CONNECTION_ERROR_MESSAGE);
    assert!(!store.is_loading().await);

    let event = event_rx.recv().await.expect("failure event");
    assert!(matches!(event, SendEvent::Failed { ref session_id } if *session_id == session.id));
}

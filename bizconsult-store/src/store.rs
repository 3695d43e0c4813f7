//! Session lifecycle and streaming reply merge

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use bizconsult_core::persona;
use bizconsult_core::session::{ChatSession, Message};
use bizconsult_providers::{ConversationProvider, ProviderResult};

use crate::events::SendEvent;

/// Mutable conversation state behind the store lock
#[derive(Debug, Default)]
struct StoreState {
    /// Sessions, most recently created first
    sessions: Vec<ChatSession>,
    /// Id of the session being displayed
    active_session_id: Option<String>,
    /// True while a send-and-stream is in flight
    is_loading: bool,
    /// Text the user is composing
    draft_input: String,
}

/// What delete_session still has to do after the removal transition
enum DeleteFollowup {
    None,
    Reseed(Vec<Message>),
    CreateReplacement,
}

/// Owns the conversation state and applies every mutation to it.
///
/// All operations serialize through an internal write lock; each locked
/// scope is one discrete state transition. Reads hand out snapshot clones.
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<RwLock<StoreState>>,
    provider: Arc<dyn ConversationProvider>,
}

impl SessionStore {
    /// Create a store backed by `provider`, with no sessions yet
    pub fn new(provider: Arc<dyn ConversationProvider>) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            provider,
        }
    }

    /// Create a fresh session, prepend it, and make it active.
    ///
    /// The provider is reset to an empty conversation context; a provider
    /// failure here is logged and swallowed. Returns a snapshot of the
    /// created session.
    pub async fn create_session(&self) -> ChatSession {
        let session = ChatSession::new();
        {
            let mut state = self.state.write().await;
            state.active_session_id = Some(session.id.clone());
            state.sessions.insert(0, session.clone());
        }
        info!("Created session {}", session.id);

        if let Err(e) = self.provider.start_conversation(&[]).await {
            warn!("Failed to start conversation context: {}", e);
        }

        session
    }

    /// Make the session with `id` active and re-seed the provider with its
    /// history. No-op returning false when the id is unknown.
    pub async fn select_session(&self, id: &str) -> bool {
        let history = {
            let mut state = self.state.write().await;
            let Some(index) = state.sessions.iter().position(|s| s.id == id) else {
                debug!("Ignoring select of unknown session {}", id);
                return false;
            };
            let history = state.sessions[index].messages.clone();
            state.active_session_id = Some(id.to_string());
            history
        };

        if let Err(e) = self.provider.start_conversation(&history).await {
            warn!("Failed to re-seed conversation context: {}", e);
        }
        true
    }

    /// Remove the session with `id`. No-op returning false when the id is
    /// unknown.
    ///
    /// When the removed session was active, the first remaining session
    /// becomes active. Removing the last session leaves the list empty for
    /// a transient instant and then creates a replacement as a second,
    /// distinct transition.
    pub async fn delete_session(&self, id: &str) -> bool {
        let followup = {
            let mut state = self.state.write().await;
            let Some(index) = state.sessions.iter().position(|s| s.id == id) else {
                debug!("Ignoring delete of unknown session {}", id);
                return false;
            };
            state.sessions.remove(index);

            if state.sessions.is_empty() {
                state.active_session_id = None;
                DeleteFollowup::CreateReplacement
            } else if state.active_session_id.as_deref() == Some(id) {
                let first_id = state.sessions[0].id.clone();
                let history = state.sessions[0].messages.clone();
                state.active_session_id = Some(first_id);
                DeleteFollowup::Reseed(history)
            } else {
                DeleteFollowup::None
            }
        };
        info!("Deleted session {}", id);

        match followup {
            DeleteFollowup::None => {}
            DeleteFollowup::Reseed(history) => {
                if let Err(e) = self.provider.start_conversation(&history).await {
                    warn!("Failed to re-seed conversation context: {}", e);
                }
            }
            DeleteFollowup::CreateReplacement => {
                self.create_session().await;
            }
        }
        true
    }

    /// Append a user message to the active session and stream the reply
    /// into it, reporting progress on `events`.
    ///
    /// Rejected without touching state (returning false) when `text` is
    /// blank, a send is already in flight, or no session is active.
    /// Resolves once the reply has completed or failed; a failed reply is
    /// replaced by the fixed connection-error text and swallowed.
    pub async fn send_message(
        &self,
        text: &str,
        events: Option<&UnboundedSender<SendEvent>>,
    ) -> bool {
        let session_id = {
            let mut state = self.state.write().await;
            if text.trim().is_empty() || state.is_loading {
                return false;
            }
            let Some(active_id) = state.active_session_id.clone() else {
                return false;
            };
            let Some(index) = state.sessions.iter().position(|s| s.id == active_id) else {
                error!("Active session {} missing from store", active_id);
                return false;
            };

            let session = &mut state.sessions[index];
            // Only the welcome message so far: this input names the session
            if session.messages.len() == 1 {
                session.title = ChatSession::title_from_input(text);
            }
            session.messages.push(Message::user(text));
            session.messages.push(Message::model(""));

            state.draft_input.clear();
            state.is_loading = true;
            active_id
        };

        debug!("Dispatching message to session {}", session_id);
        let outcome = self.stream_into_session(&session_id, text, events).await;

        if let Err(e) = &outcome {
            warn!("Reply stream failed for session {}: {}", session_id, e);
            self.replace_trailing_reply(&session_id, persona::CONNECTION_ERROR_MESSAGE)
                .await;
        }

        {
            let mut state = self.state.write().await;
            state.is_loading = false;
        }

        if let Some(tx) = events {
            let event = match outcome {
                Ok(()) => SendEvent::Completed { session_id },
                Err(_) => SendEvent::Failed { session_id },
            };
            let _ = tx.send(event);
        }
        true
    }

    /// Replace the draft the user is composing
    pub async fn update_draft(&self, text: impl Into<String>) {
        let mut state = self.state.write().await;
        state.draft_input = text.into();
    }

    /// Send the current draft; the dispatch transition clears it
    pub async fn submit_send(&self, events: Option<&UnboundedSender<SendEvent>>) -> bool {
        let draft = self.state.read().await.draft_input.clone();
        self.send_message(&draft, events).await
    }

    /// Snapshot of all sessions, newest first
    pub async fn sessions(&self) -> Vec<ChatSession> {
        self.state.read().await.sessions.clone()
    }

    /// Id of the active session, if any
    pub async fn active_session_id(&self) -> Option<String> {
        self.state.read().await.active_session_id.clone()
    }

    /// Snapshot of the active session
    pub async fn active_session(&self) -> Option<ChatSession> {
        let state = self.state.read().await;
        let id = state.active_session_id.as_deref()?;
        state.sessions.iter().find(|s| s.id == id).cloned()
    }

    /// True while a send-and-stream is in flight
    pub async fn is_loading(&self) -> bool {
        self.state.read().await.is_loading
    }

    /// Text the user is composing
    pub async fn draft_input(&self) -> String {
        self.state.read().await.draft_input.clone()
    }

    /// Drain the reply stream, folding each fragment into the trailing
    /// message of the session captured at send time. If that session was
    /// deleted mid-stream the remaining fragments are dropped while the
    /// stream is still drained.
    async fn stream_into_session(
        &self,
        session_id: &str,
        text: &str,
        events: Option<&UnboundedSender<SendEvent>>,
    ) -> ProviderResult<()> {
        let mut stream = self.provider.stream_reply(text).await?;
        let mut full_reply = String::new();

        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            full_reply.push_str(&fragment);

            {
                let mut state = self.state.write().await;
                let Some(session) = state.sessions.iter_mut().find(|s| s.id == session_id)
                else {
                    debug!("Session {} gone, dropping fragment", session_id);
                    continue;
                };
                if let Some(last) = session.last_message_mut() {
                    last.content = full_reply.clone();
                }
            }

            if let Some(tx) = events {
                let _ = tx.send(SendEvent::Delta {
                    session_id: session_id.to_string(),
                    text: fragment,
                });
            }
        }
        Ok(())
    }

    /// Replace the content of the session's trailing message, if the
    /// session still exists
    async fn replace_trailing_reply(&self, session_id: &str, content: &str) {
        let mut state = self.state.write().await;
        let Some(session) = state.sessions.iter_mut().find(|s| s.id == session_id) else {
            return;
        };
        if let Some(last) = session.last_message_mut() {
            last.content = content.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizconsult_core::session::Role;
    use bizconsult_providers::{ScriptedProvider, ScriptedReply};

    fn scripted_store<I>(replies: I) -> (SessionStore, Arc<ScriptedProvider>)
    where
        I: IntoIterator<Item = ScriptedReply>,
    {
        let provider = Arc::new(ScriptedProvider::with_replies(replies));
        (SessionStore::new(provider.clone()), provider)
    }

    #[tokio::test]
    async fn test_create_session_prepends_and_activates() {
        let (store, provider) = scripted_store([]);

        let first = store.create_session().await;
        let second = store.create_session().await;

        let sessions = store.sessions().await;
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, second.id);
        assert_eq!(sessions[1].id, first.id);
        assert_eq!(store.active_session_id().await, Some(second.id.clone()));

        // Each creation resets the provider with an empty context
        let histories = provider.started_histories();
        assert_eq!(histories.len(), 2);
        assert!(histories.iter().all(|h| h.is_empty()));
    }

    #[tokio::test]
    async fn test_select_session_switches_active_and_reseeds_provider() {
        let (store, provider) = scripted_store([]);
        let first = store.create_session().await;
        let _second = store.create_session().await;

        assert!(store.select_session(&first.id).await);

        assert_eq!(store.active_session_id().await, Some(first.id.clone()));
        let histories = provider.started_histories();
        assert_eq!(histories.len(), 3);
        assert_eq!(histories[2].len(), 1);
        assert_eq!(histories[2][0].content, persona::WELCOME_MESSAGE);
    }

    #[tokio::test]
    async fn test_select_unknown_session_is_a_noop() {
        let (store, _provider) = scripted_store([]);
        let created = store.create_session().await;

        assert!(!store.select_session("missing").await);
        assert_eq!(store.active_session_id().await, Some(created.id));
    }

    #[tokio::test]
    async fn test_delete_active_session_promotes_first_remaining() {
        let (store, provider) = scripted_store([]);
        let a = store.create_session().await;
        let b = store.create_session().await;

        assert!(store.delete_session(&b.id).await);

        let sessions = store.sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, a.id);
        assert_eq!(store.active_session_id().await, Some(a.id.clone()));
        // Re-seeded with the promoted session's history
        assert_eq!(provider.started_histories().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_non_active_session_leaves_active_untouched() {
        let (store, provider) = scripted_store([]);
        let a = store.create_session().await;
        let b = store.create_session().await;
        let histories_before = provider.started_histories().len();

        assert!(store.delete_session(&a.id).await);

        assert_eq!(store.active_session_id().await, Some(b.id.clone()));
        let sessions = store.sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, b.id);
        assert_eq!(provider.started_histories().len(), histories_before);
    }

    #[tokio::test]
    async fn test_delete_last_session_creates_replacement() {
        let (store, _provider) = scripted_store([]);
        let only = store.create_session().await;

        assert!(store.delete_session(&only.id).await);

        let sessions = store.sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_ne!(sessions[0].id, only.id);
        assert_eq!(sessions[0].title, persona::DEFAULT_SESSION_TITLE);
        assert_eq!(sessions[0].messages.len(), 1);
        assert_eq!(sessions[0].messages[0].role, Role::Model);
        assert_eq!(store.active_session_id().await, Some(sessions[0].id.clone()));
    }

    #[tokio::test]
    async fn test_delete_unknown_session_is_a_noop() {
        let (store, _provider) = scripted_store([]);
        let created = store.create_session().await;

        assert!(!store.delete_session("missing").await);

        assert_eq!(store.sessions().await.len(), 1);
        assert_eq!(store.active_session_id().await, Some(created.id));
    }

    #[tokio::test]
    async fn test_send_without_active_session_is_rejected() {
        let (store, provider) = scripted_store([]);

        assert!(!store.send_message("hola", None).await);

        assert!(store.sessions().await.is_empty());
        assert!(provider.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn test_send_with_blank_input_is_rejected() {
        let (store, provider) = scripted_store([]);
        store.create_session().await;

        assert!(!store.send_message("   \n", None).await);

        assert_eq!(store.sessions().await[0].messages.len(), 1);
        assert!(provider.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn test_send_assembles_streamed_reply() {
        let (store, _provider) =
            scripted_store([ScriptedReply::fragments(["Hola", " mundo"])]);
        store.create_session().await;

        assert!(
            store
                .send_message("¿Cómo escalo mi startup de SaaS B2B?", None)
                .await
        );

        let session = &store.sessions().await[0];
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[1].role, Role::User);
        assert_eq!(
            session.messages[1].content,
            "¿Cómo escalo mi startup de SaaS B2B?"
        );
        assert_eq!(session.messages[2].role, Role::Model);
        assert_eq!(session.messages[2].content, "Hola mundo");
        assert!(!store.is_loading().await);
    }

    #[tokio::test]
    async fn test_first_user_message_names_the_session() {
        let (store, _provider) = scripted_store([
            ScriptedReply::fragments(["claro"]),
            ScriptedReply::fragments(["claro"]),
        ]);
        store.create_session().await;

        store
            .send_message("¿Cómo escalo mi startup de SaaS B2B?", None)
            .await;
        let title_after_first = store.sessions().await[0].title.clone();
        assert_eq!(title_after_first, "¿Cómo escalo mi startup de Saa...");

        store.send_message("¿Y el pricing?", None).await;
        assert_eq!(store.sessions().await[0].title, title_after_first);
    }

    #[tokio::test]
    async fn test_stream_failure_replaces_partial_reply_with_error_text() {
        let (store, _provider) =
            scripted_store([ScriptedReply::failure_after(["Para "])]);
        store.create_session().await;

        assert!(store.send_message("hola", None).await);

        let session = &store.sessions().await[0];
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[2].role, Role::Model);
        assert_eq!(session.messages[2].content, persona::CONNECTION_ERROR_MESSAGE);
        assert!(!store.is_loading().await);
    }

    #[tokio::test]
    async fn test_update_draft_and_submit_send() {
        let (store, provider) = scripted_store([ScriptedReply::fragments(["bien"])]);
        store.create_session().await;

        store.update_draft("¿Cómo mejoro mis ventas?").await;
        assert_eq!(store.draft_input().await, "¿Cómo mejoro mis ventas?");

        assert!(store.submit_send(None).await);

        assert_eq!(store.draft_input().await, "");
        assert_eq!(provider.sent_texts(), vec!["¿Cómo mejoro mis ventas?".to_string()]);
    }

    #[tokio::test]
    async fn test_submit_send_with_blank_draft_is_rejected() {
        let (store, _provider) = scripted_store([]);
        store.create_session().await;

        assert!(!store.submit_send(None).await);
        assert_eq!(store.sessions().await[0].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_active_session_snapshot_follows_selection() {
        let (store, _provider) = scripted_store([]);
        let first = store.create_session().await;
        let second = store.create_session().await;

        assert_eq!(store.active_session().await.unwrap().id, second.id);
        store.select_session(&first.id).await;
        assert_eq!(store.active_session().await.unwrap().id, first.id);
    }
}

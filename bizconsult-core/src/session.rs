//! Chat session data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::persona;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// A single message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message author
    pub role: Role,
    /// Message text
    pub content: String,
    /// Creation time, assigned once
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message stamped with the current time
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self::new(Role::Model, content)
    }
}

/// A consulting conversation and its sidebar title
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique id, assigned at creation
    pub id: String,
    /// Display title, rewritten once from the first user message
    pub title: String,
    /// Messages in conversational order, never empty after creation
    pub messages: Vec<Message>,
    /// Session creation time
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    /// Create a session seeded with the welcome message
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: persona::DEFAULT_SESSION_TITLE.to_string(),
            messages: vec![Message::model(persona::WELCOME_MESSAGE)],
            created_at: Utc::now(),
        }
    }

    /// Derive a display title from the first user message.
    /// The ellipsis is always appended, even for short inputs.
    pub fn title_from_input(input: &str) -> String {
        let prefix: String = input.chars().take(persona::TITLE_PREFIX_CHARS).collect();
        format!("{}...", prefix)
    }

    /// The message currently being streamed into, if any
    pub fn last_message_mut(&mut self) -> Option<&mut Message> {
        self.messages.last_mut()
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

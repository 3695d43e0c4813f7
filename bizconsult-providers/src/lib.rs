//! Conversation provider integrations for bizconsult
//!
//! This crate provides the conversation abstraction the session store talks
//! to, a streaming Gemini client, and a scripted offline implementation.

pub mod base;
pub mod gemini;
pub mod scripted;

pub use base::{ConversationProvider, ProviderError, ProviderResult, ReplyStream};
pub use gemini::GeminiProvider;
pub use scripted::{ScriptedProvider, ScriptedReply};

//! Session state management for bizconsult
//!
//! The [`SessionStore`] owns the list of consulting sessions, the active
//! session pointer, and the streaming merge of model replies into the
//! conversation. Presenters read snapshots and feed user intents back in;
//! a [`SendEvent`] channel carries streaming progress for incremental
//! rendering.

pub mod events;
pub mod store;

pub use events::SendEvent;
pub use store::SessionStore;

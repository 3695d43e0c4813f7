//! Events emitted while a reply streams in

use serde::{Deserialize, Serialize};

/// Progress of an in-flight send, addressed by the session that owns it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SendEvent {
    /// A reply fragment was folded into the session's trailing message
    Delta { session_id: String, text: String },
    /// The reply completed and the loading flag was cleared
    Completed { session_id: String },
    /// The reply failed; the fixed error text replaced it
    Failed { session_id: String },
}

//! Per-session conversation tracking.
//!
//! A conversation is a logical grouping of messages, identified by an id
//! chosen by the initiating sender. The registry is append-only for the
//! session's lifetime; it is bounded implicitly by session teardown.

use indexmap::IndexSet;

/// Append-only set of conversation ids known to one session.
///
/// Insertion order is preserved, which is not required for correctness
/// but aids debugging.
#[derive(Debug, Default)]
pub struct ConversationRegistry {
    conversations: IndexSet<String>,
}

impl ConversationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a conversation id. Returns `true` if the id was new.
    pub fn register(&mut self, conversation_id: &str) -> bool {
        self.conversations.insert(conversation_id.to_string())
    }

    /// Check whether a conversation is known.
    pub fn contains(&self, conversation_id: &str) -> bool {
        self.conversations.contains(conversation_id)
    }

    /// Number of known conversations.
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether no conversations are known yet.
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Snapshot of all known conversation ids, in insertion order.
    pub fn snapshot(&self) -> Vec<String> {
        self.conversations.iter().cloned().collect()
    }
}

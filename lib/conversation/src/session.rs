//! Chat session state.
//!
//! A session owns two histories. The primary history is the one replayed
//! in full to the primary backend on every turn. The mirror records what
//! the secondary backend has seen; that backend keeps its own server-side
//! context, so the mirror is for inspection only.

use crate::history::ConversationHistory;
use crate::message::Message;
use chrono::{DateTime, Utc};
use parley_core::SessionId;
use serde::{Deserialize, Serialize};

/// Instructions sent as the first user turn when none are configured.
pub const DEFAULT_INSTRUCTIONS: &str = "You are taking part in a conversation that may include \
another AI model. Answer clearly and concisely. When the user asks for an auto insurance quote, \
collect the vehicle make, model, year and ZIP code, then use the get_quote tool.";

/// Assistant turn that acknowledges the instructions in the seed.
pub const SEED_ACKNOWLEDGEMENT: &str = "Understood";

/// A chat session with its primary and mirror histories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique session identifier.
    pub id: SessionId,
    primary: ConversationHistory,
    mirror: ConversationHistory,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session last processed input.
    pub last_active_at: DateTime<Utc>,
}

impl ChatSession {
    /// Creates a session primed with `instructions`.
    ///
    /// The primary history starts as `[user: instructions, assistant: "Understood"]`.
    #[must_use]
    pub fn new(instructions: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            primary: ConversationHistory::seeded([
                Message::user(instructions),
                Message::assistant(SEED_ACKNOWLEDGEMENT),
            ]),
            mirror: ConversationHistory::new(),
            created_at: now,
            last_active_at: now,
        }
    }

    /// History replayed to the primary backend.
    #[must_use]
    pub fn primary(&self) -> &ConversationHistory {
        &self.primary
    }

    /// Record of the secondary backend's exchanges.
    #[must_use]
    pub fn mirror(&self) -> &ConversationHistory {
        &self.mirror
    }

    pub(crate) fn primary_mut(&mut self) -> &mut ConversationHistory {
        &mut self.primary
    }

    pub(crate) fn mirror_mut(&mut self) -> &mut ConversationHistory {
        &mut self.mirror
    }

    /// Marks the session as active now.
    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    /// Restores the primary history to its seed and clears the mirror.
    pub fn reset(&mut self) {
        self.primary.reset();
        self.mirror.reset();
        self.touch();
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_ai::MessageRole;

    #[test]
    fn new_session_is_primed() {
        let session = ChatSession::new("Be brief.");
        let seed = session.primary().messages();
        assert_eq!(seed.len(), 2);
        assert_eq!(seed[0].role, MessageRole::User);
        assert_eq!(seed[0].content, "Be brief.");
        assert_eq!(seed[1].role, MessageRole::Assistant);
        assert_eq!(seed[1].content, SEED_ACKNOWLEDGEMENT);
        assert!(session.mirror().is_empty());
    }

    #[test]
    fn default_session_uses_default_instructions() {
        let session = ChatSession::default();
        assert_eq!(session.primary().messages()[0].content, DEFAULT_INSTRUCTIONS);
    }

    #[test]
    fn reset_clears_exchanges_and_mirror() {
        let mut session = ChatSession::default();
        session.primary_mut().push_user("hello");
        session.primary_mut().push_assistant("hi");
        session.mirror_mut().push_user("hello");

        session.reset();

        assert_eq!(session.primary().len(), 2);
        assert!(session.mirror().is_empty());
    }

    #[test]
    fn sessions_get_distinct_ids() {
        assert_ne!(ChatSession::default().id, ChatSession::default().id);
    }
}

//! Ordered, append-only conversation history with a fixed priming seed.

use crate::message::Message;
use parley_ai::LlmMessage;
use serde::{Deserialize, Serialize};

/// An ordered list of role-tagged messages.
///
/// The first `seed_len` entries are the priming seed. They survive
/// [`ConversationHistory::reset`]; everything after them is dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory {
    messages: Vec<Message>,
    seed_len: usize,
}

impl ConversationHistory {
    /// Creates an empty history with no seed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a history whose first entries are `seed`.
    #[must_use]
    pub fn seeded(seed: impl IntoIterator<Item = Message>) -> Self {
        let messages: Vec<Message> = seed.into_iter().collect();
        let seed_len = messages.len();
        Self { messages, seed_len }
    }

    /// Appends a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Appends a user message.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    /// Appends an assistant message.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::assistant(content));
    }

    /// Returns all messages, seed included.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the priming seed.
    #[must_use]
    pub fn seed(&self) -> &[Message] {
        &self.messages[..self.seed_len]
    }

    /// Returns the messages recorded after the seed.
    #[must_use]
    pub fn exchanges(&self) -> &[Message] {
        &self.messages[self.seed_len..]
    }

    /// Returns the most recent message.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drops everything after the seed.
    pub fn reset(&mut self) {
        self.messages.truncate(self.seed_len);
    }

    /// Returns the history as wire messages, oldest first.
    #[must_use]
    pub fn to_llm_messages(&self) -> Vec<LlmMessage> {
        self.messages.iter().map(Message::to_llm).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_ai::MessageRole;

    fn seeded() -> ConversationHistory {
        ConversationHistory::seeded([
            Message::user("instructions"),
            Message::assistant("Understood"),
        ])
    }

    #[test]
    fn seeded_history_starts_with_seed() {
        let history = seeded();
        assert_eq!(history.len(), 2);
        assert_eq!(history.seed().len(), 2);
        assert!(history.exchanges().is_empty());
    }

    #[test]
    fn push_appends_in_order() {
        let mut history = seeded();
        history.push_user("hello");
        history.push_assistant("hi there");

        assert_eq!(history.len(), 4);
        let exchanges = history.exchanges();
        assert_eq!(exchanges[0].role, MessageRole::User);
        assert_eq!(exchanges[1].content, "hi there");
        assert_eq!(history.last().map(|m| m.content.as_str()), Some("hi there"));
    }

    #[test]
    fn reset_restores_exact_seed() {
        let mut history = seeded();
        let seed_ids: Vec<_> = history.seed().iter().map(|m| m.id).collect();
        history.push_user("one");
        history.push_assistant("two");
        history.push_user("three");

        history.reset();

        assert_eq!(history.len(), 2);
        let ids: Vec<_> = history.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, seed_ids);
    }

    #[test]
    fn reset_on_unseeded_history_empties_it() {
        let mut history = ConversationHistory::new();
        history.push_user("hello");
        history.reset();
        assert!(history.is_empty());
    }

    #[test]
    fn to_llm_messages_preserves_order() {
        let mut history = seeded();
        history.push_user("question");
        let wire = history.to_llm_messages();
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0], LlmMessage::user("instructions"));
        assert_eq!(wire[1], LlmMessage::assistant("Understood"));
        assert_eq!(wire[2], LlmMessage::user("question"));
    }
}

//! Message types for conversation histories.

use chrono::{DateTime, Utc};
use parley_ai::{LlmMessage, MessageRole};
use parley_core::MessageId;
use serde::{Deserialize, Serialize};

/// A message in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier.
    pub id: MessageId,
    /// Message role.
    pub role: MessageRole,
    /// Message content.
    pub content: String,
    /// When the message was recorded.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a new message.
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Returns the wire form sent to a backend.
    #[must_use]
    pub fn to_llm(&self) -> LlmMessage {
        LlmMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

impl From<LlmMessage> for Message {
    fn from(message: LlmMessage) -> Self {
        Self::new(message.role, message.content)
    }
}

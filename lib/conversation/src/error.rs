//! Error types for the conversation crate.
//!
//! Backend failures are never surfaced here: the orchestrator turns them
//! into tagged reply lines. These errors cover caller input that is
//! parsed strictly, such as a target typed at a prompt or a policy name
//! read from configuration.

use std::fmt;

/// Errors from conversation-level parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// Target selector names no backend.
    UnknownTarget { value: String },
    /// Failure policy name is not recognized.
    UnknownFailurePolicy { value: String },
}

impl fmt::Display for ConversationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTarget { value } => {
                write!(f, "unknown chat target '{value}' (expected claude, gemini or both)")
            }
            Self::UnknownFailurePolicy { value } => {
                write!(f, "unknown dialogue failure policy '{value}' (expected continue or abort)")
            }
        }
    }
}

impl std::error::Error for ConversationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_target_display() {
        let err = ConversationError::UnknownTarget {
            value: "gpt".to_string(),
        };
        assert!(err.to_string().contains("'gpt'"));
    }

    #[test]
    fn unknown_policy_display() {
        let err = ConversationError::UnknownFailurePolicy {
            value: "retry".to_string(),
        };
        assert!(err.to_string().contains("continue or abort"));
    }
}

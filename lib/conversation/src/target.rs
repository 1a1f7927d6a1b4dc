//! Chat target selection.

use crate::error::ConversationError;
use parley_ai::LlmProvider;
use std::fmt;
use std::str::FromStr;

/// Which backend(s) a user turn is routed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ChatTarget {
    /// Only the primary backend (Claude).
    Primary,
    /// Only the secondary backend (Gemini).
    Secondary,
    /// Primary first, then secondary.
    #[default]
    Both,
    /// A selector that names no backend. Routes nowhere.
    Unrecognized(String),
}

/// How a reply is laid out for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatMode {
    /// Side-by-side, one decorated block per backend.
    Both,
    /// The reply text as produced.
    Single,
}

impl ChatTarget {
    /// Parses a selector, keeping unknown values as [`ChatTarget::Unrecognized`].
    ///
    /// Matching is case-insensitive. `claude`/`a` select the primary
    /// backend, `gemini`/`b` the secondary.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "claude" | "a" | "primary" => Self::Primary,
            "gemini" | "b" | "secondary" => Self::Secondary,
            "both" => Self::Both,
            _ => Self::Unrecognized(value.trim().to_string()),
        }
    }

    /// Returns true if the primary backend is called.
    #[must_use]
    pub fn includes_primary(&self) -> bool {
        matches!(self, Self::Primary | Self::Both)
    }

    /// Returns true if the secondary backend is called.
    #[must_use]
    pub fn includes_secondary(&self) -> bool {
        matches!(self, Self::Secondary | Self::Both)
    }

    /// Returns the target for a single provider.
    #[must_use]
    pub fn for_provider(provider: LlmProvider) -> Self {
        match provider {
            LlmProvider::Anthropic => Self::Primary,
            LlmProvider::Gemini => Self::Secondary,
        }
    }

    /// Returns the display mode for replies to this target.
    #[must_use]
    pub fn mode(&self) -> ChatMode {
        match self {
            Self::Both => ChatMode::Both,
            _ => ChatMode::Single,
        }
    }
}

impl fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("claude"),
            Self::Secondary => f.write_str("gemini"),
            Self::Both => f.write_str("both"),
            Self::Unrecognized(value) => f.write_str(value),
        }
    }
}

/// Strict parsing: unknown selectors are an error.
impl FromStr for ChatTarget {
    type Err = ConversationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::parse(s) {
            Self::Unrecognized(value) => Err(ConversationError::UnknownTarget { value }),
            target => Ok(target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_targets() {
        assert_eq!(ChatTarget::parse("claude"), ChatTarget::Primary);
        assert_eq!(ChatTarget::parse("Gemini"), ChatTarget::Secondary);
        assert_eq!(ChatTarget::parse(" BOTH "), ChatTarget::Both);
        assert_eq!(ChatTarget::parse("a"), ChatTarget::Primary);
        assert_eq!(ChatTarget::parse("b"), ChatTarget::Secondary);
    }

    #[test]
    fn parse_keeps_unknown_value() {
        assert_eq!(
            ChatTarget::parse("gpt"),
            ChatTarget::Unrecognized("gpt".to_string())
        );
    }

    #[test]
    fn strict_parse_rejects_unknown() {
        assert!("claude".parse::<ChatTarget>().is_ok());
        let err = "gpt".parse::<ChatTarget>().unwrap_err();
        assert_eq!(
            err,
            ConversationError::UnknownTarget {
                value: "gpt".to_string()
            }
        );
    }

    #[test]
    fn routing_flags() {
        assert!(ChatTarget::Both.includes_primary());
        assert!(ChatTarget::Both.includes_secondary());
        assert!(!ChatTarget::Primary.includes_secondary());
        assert!(!ChatTarget::Secondary.includes_primary());
        let unknown = ChatTarget::Unrecognized("x".to_string());
        assert!(!unknown.includes_primary());
        assert!(!unknown.includes_secondary());
    }

    #[test]
    fn mode_follows_target() {
        assert_eq!(ChatTarget::Both.mode(), ChatMode::Both);
        assert_eq!(ChatTarget::Primary.mode(), ChatMode::Single);
    }

    #[test]
    fn display_roundtrips_known_targets() {
        for target in [ChatTarget::Primary, ChatTarget::Secondary, ChatTarget::Both] {
            assert_eq!(ChatTarget::parse(&target.to_string()), target);
        }
    }
}

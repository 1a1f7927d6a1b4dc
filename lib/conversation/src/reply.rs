//! Tagged replies and dialogue transcripts.
//!
//! Every backend outcome is kept as a [`TaggedLine`] with its source and
//! result. Display output (`Claude: ...`) is derived from these records,
//! never parsed back out of text.

use chrono::{DateTime, Utc};
use parley_ai::{LlmError, LlmProvider};
use parley_core::DialogueId;
use std::fmt;

/// Text shown when no backend line exists for a reply.
pub const NO_RESPONSE: &str = "No response";

/// Text shown when a reply has no lines at all.
pub const NO_RESPONSE_RECEIVED: &str = "No response received";

/// How a backend call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// The backend answered with text.
    Reply,
    /// The call failed.
    Failed(LlmError),
    /// The backend answered but produced nothing to show.
    NoResponse,
}

/// One backend's contribution to a reply.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedLine {
    /// Backend that produced the line.
    pub source: LlmProvider,
    /// Line text without the backend label.
    pub text: String,
    /// How the call ended.
    pub outcome: LineOutcome,
}

impl TaggedLine {
    /// A successful reply.
    #[must_use]
    pub fn reply(source: LlmProvider, text: impl Into<String>) -> Self {
        Self {
            source,
            text: text.into(),
            outcome: LineOutcome::Reply,
        }
    }

    /// A failed call; the text reads `Error - <message>`.
    #[must_use]
    pub fn failed(source: LlmProvider, error: LlmError) -> Self {
        Self {
            source,
            text: format!("Error - {error}"),
            outcome: LineOutcome::Failed(error),
        }
    }

    /// A call that yielded no displayable text.
    #[must_use]
    pub fn no_response(source: LlmProvider) -> Self {
        Self {
            source,
            text: NO_RESPONSE.to_string(),
            outcome: LineOutcome::NoResponse,
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, LineOutcome::Failed(_))
    }

    /// Returns the error if the call failed.
    #[must_use]
    pub fn error(&self) -> Option<&LlmError> {
        match &self.outcome {
            LineOutcome::Failed(error) => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for TaggedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source.label(), self.text)
    }
}

/// The result of one user turn: zero, one or two tagged lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    lines: Vec<TaggedLine>,
}

impl Reply {
    #[must_use]
    pub fn new(lines: Vec<TaggedLine>) -> Self {
        Self { lines }
    }

    #[must_use]
    pub fn lines(&self) -> &[TaggedLine] {
        &self.lines
    }

    /// Returns the line produced by `provider`, if it was called.
    #[must_use]
    pub fn line_for(&self, provider: LlmProvider) -> Option<&TaggedLine> {
        self.lines.iter().find(|line| line.source == provider)
    }

    /// Consumes the reply, returning `provider`'s line or a placeholder.
    #[must_use]
    pub fn into_line_for(self, provider: LlmProvider) -> TaggedLine {
        self.lines
            .into_iter()
            .find(|line| line.source == provider)
            .unwrap_or_else(|| TaggedLine::no_response(provider))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Iterates the lines whose backend call failed.
    pub fn failures(&self) -> impl Iterator<Item = &TaggedLine> {
        self.lines.iter().filter(|line| line.is_failure())
    }

    /// Returns true if any backend call failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lines.is_empty() {
            return f.write_str(NO_RESPONSE_RECEIVED);
        }
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}

/// One round of an automated dialogue.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueTurn {
    /// The primary backend's line.
    pub primary: TaggedLine,
    /// The secondary backend's line; absent if the dialogue aborted first.
    pub secondary: Option<TaggedLine>,
}

/// The record of an automated dialogue.
///
/// Renders as a header line, a blank line, then each turn's lines
/// followed by a blank separator.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    /// Unique dialogue identifier.
    pub id: DialogueId,
    /// The dialogue topic.
    pub topic: String,
    turns: Vec<DialogueTurn>,
    aborted: bool,
    /// When the dialogue started.
    pub started_at: DateTime<Utc>,
}

impl Transcript {
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            id: DialogueId::new(),
            topic: topic.into(),
            turns: Vec::new(),
            aborted: false,
            started_at: Utc::now(),
        }
    }

    /// The header line, e.g. `Starting AI dialogue on topic: tea`.
    #[must_use]
    pub fn header(&self) -> String {
        format!("Starting AI dialogue on topic: {}", self.topic)
    }

    pub fn push_turn(&mut self, turn: DialogueTurn) {
        self.turns.push(turn);
    }

    /// Marks the dialogue as stopped early.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    #[must_use]
    pub fn turns(&self) -> &[DialogueTurn] {
        &self.turns
    }

    /// Returns true if the dialogue stopped before its requested turn count.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Iterates every tagged line in order.
    pub fn lines(&self) -> impl Iterator<Item = &TaggedLine> {
        self.turns
            .iter()
            .flat_map(|turn| std::iter::once(&turn.primary).chain(turn.secondary.as_ref()))
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header())?;
        for turn in &self.turns {
            write!(f, "\n{}", turn.primary)?;
            if let Some(secondary) = &turn.secondary {
                write!(f, "\n{secondary}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

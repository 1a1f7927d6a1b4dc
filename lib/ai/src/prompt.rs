//! Prompt templates for automated dialogues.
//!
//! Templates use `{{variable}}` placeholders. Unknown placeholders are left
//! in place so a misspelt variable shows up in the transcript instead of
//! silently disappearing.

use serde::{Deserialize, Serialize};

/// Default prompt sent to the primary backend each turn.
pub const DEFAULT_OPENER: &str =
    "Respond to this message in the dialogue about '{{topic}}': '{{message}}'. Be concise and engaging.";

/// Default prompt sent to the secondary backend each turn.
pub const DEFAULT_REPLY: &str = "You are in a dialogue about '{{topic}}'. Respond to {{peer}}'s message: '{{message}}'. Be concise and engaging.";

/// A named prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Template name (used in logs).
    pub name: String,
    /// Template content with placeholders.
    pub content: String,
}

impl PromptTemplate {
    /// Creates a new prompt template.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Renders the template with the given variables.
    #[must_use]
    pub fn render(&self, variables: &[(&str, &str)]) -> String {
        let mut result = self.content.clone();

        for (name, value) in variables {
            let placeholder = format!("{{{{{name}}}}}");
            result = result.replace(&placeholder, value);
        }

        result
    }

    /// Returns the placeholder names used by this template, in order of
    /// first appearance.
    #[must_use]
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut rest = self.content.as_str();
        while let Some(start) = rest.find("{{") {
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else { break };
            let name = after[..end].trim();
            if !names.contains(&name) {
                names.push(name);
            }
            rest = &after[end + 2..];
        }
        names
    }
}

/// The pair of templates driving an automated dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialoguePrompts {
    /// Prompt for the primary backend; sees `topic` and `message`.
    pub opener: PromptTemplate,
    /// Prompt for the secondary backend; sees `topic`, `peer` and `message`.
    pub reply: PromptTemplate,
}

impl Default for DialoguePrompts {
    fn default() -> Self {
        Self {
            opener: PromptTemplate::new("dialogue_opener", DEFAULT_OPENER),
            reply: PromptTemplate::new("dialogue_reply", DEFAULT_REPLY),
        }
    }
}

impl DialoguePrompts {
    /// Builds the primary backend's prompt for one turn.
    #[must_use]
    pub fn opener_for(&self, topic: &str, previous: &str) -> String {
        self.opener
            .render(&[("topic", topic), ("message", previous)])
    }

    /// Builds the secondary backend's prompt answering `peer`'s text.
    #[must_use]
    pub fn reply_for(&self, topic: &str, peer: &str, message: &str) -> String {
        self.reply
            .render(&[("topic", topic), ("peer", peer), ("message", message)])
    }
}

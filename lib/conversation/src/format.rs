//! Display formatting for replies and transcripts.

use crate::reply::{NO_RESPONSE, Reply};
use crate::target::ChatMode;
use parley_ai::LlmProvider;

const PRIMARY_MARKER: &str = "🔵";
const SECONDARY_MARKER: &str = "🟢";

/// Formats raw reply text for display.
///
/// In [`ChatMode::Both`] the first `Claude:` and `Gemini:` lines are pulled
/// out and rendered as two decorated blocks; a missing line shows as
/// `No response`. Other modes return the text unchanged.
#[must_use]
pub fn format_response(response: &str, mode: ChatMode) -> String {
    match mode {
        ChatMode::Both => {
            let primary = labelled_line(response, LlmProvider::Anthropic).unwrap_or(NO_RESPONSE);
            let secondary = labelled_line(response, LlmProvider::Gemini).unwrap_or(NO_RESPONSE);
            side_by_side(primary, secondary)
        }
        ChatMode::Single => response.to_string(),
    }
}

/// Formats a structured reply for display.
#[must_use]
pub fn format_reply(reply: &Reply, mode: ChatMode) -> String {
    match mode {
        ChatMode::Both => {
            let text = |provider| {
                reply
                    .line_for(provider)
                    .map_or(NO_RESPONSE, |line| line.text.as_str())
            };
            side_by_side(text(LlmProvider::Anthropic), text(LlmProvider::Gemini))
        }
        ChatMode::Single => reply.to_string(),
    }
}

/// Prefixes a transcript line with its backend's marker.
#[must_use]
pub fn format_transcript_line(line: &str) -> String {
    if line.starts_with(LlmProvider::Anthropic.label()) {
        format!("{PRIMARY_MARKER} {line}")
    } else if line.starts_with(LlmProvider::Gemini.label()) {
        format!("{SECONDARY_MARKER} {line}")
    } else {
        line.to_string()
    }
}

fn side_by_side(primary: &str, secondary: &str) -> String {
    format!(
        "{PRIMARY_MARKER} **{}**: {primary}\n\n{SECONDARY_MARKER} **{}**: {secondary}",
        LlmProvider::Anthropic.label(),
        LlmProvider::Gemini.label(),
    )
}

fn labelled_line(response: &str, provider: LlmProvider) -> Option<&str> {
    response.lines().find_map(|line| {
        let rest = line.strip_prefix(provider.label())?.strip_prefix(':')?;
        Some(rest.strip_prefix(' ').unwrap_or(rest))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::TaggedLine;
    use parley_ai::LlmError;

    #[test]
    fn both_mode_extracts_labelled_lines() {
        let formatted = format_response("X\nClaude: hello\nGemini: hi", ChatMode::Both);
        assert_eq!(formatted, "🔵 **Claude**: hello\n\n🟢 **Gemini**: hi");
    }

    #[test]
    fn both_mode_missing_line_is_placeholder() {
        let formatted = format_response("Gemini: only me", ChatMode::Both);
        assert_eq!(formatted, "🔵 **Claude**: No response\n\n🟢 **Gemini**: only me");
    }

    #[test]
    fn both_mode_takes_first_matching_line() {
        let formatted = format_response("Claude: one\nClaude: two\nGemini: x", ChatMode::Both);
        assert!(formatted.starts_with("🔵 **Claude**: one\n"));
    }

    #[test]
    fn single_mode_is_verbatim() {
        assert_eq!(format_response("Claude: hi", ChatMode::Single), "Claude: hi");
    }

    #[test]
    fn reply_formatting_uses_tagged_text() {
        let reply = Reply::new(vec![
            TaggedLine::reply(LlmProvider::Anthropic, "Gemini: is quoted here"),
            TaggedLine::failed(
                LlmProvider::Gemini,
                LlmError::RequestFailed {
                    reason: "timeout".to_string(),
                },
            ),
        ]);

        assert_eq!(
            format_reply(&reply, ChatMode::Both),
            "🔵 **Claude**: Gemini: is quoted here\n\n🟢 **Gemini**: Error - LLM request failed: timeout"
        );
        assert_eq!(
            format_reply(&reply, ChatMode::Single),
            "Claude: Gemini: is quoted here\nGemini: Error - LLM request failed: timeout"
        );
    }

    #[test]
    fn transcript_lines_get_markers() {
        assert_eq!(format_transcript_line("Claude: hi"), "🔵 Claude: hi");
        assert_eq!(format_transcript_line("Gemini: yo"), "🟢 Gemini: yo");
        assert_eq!(
            format_transcript_line("Starting AI dialogue on topic: tea"),
            "Starting AI dialogue on topic: tea"
        );
    }
}

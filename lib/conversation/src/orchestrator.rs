//! Turn orchestration across the two backends.
//!
//! The orchestrator routes each user turn to the primary backend, the
//! secondary backend, or both in that order, and keeps the session
//! histories in step with what each backend has seen. Backend failures
//! never escape: each becomes a failed [`TaggedLine`] and the other
//! backend still runs.

use crate::error::ConversationError;
use crate::reply::{DialogueTurn, Reply, TaggedLine, Transcript};
use crate::session::ChatSession;
use crate::target::ChatTarget;
use parley_ai::anthropic::DEFAULT_MAX_TOKENS;
use parley_ai::{DialoguePrompts, LlmBackend, LlmRequest, LlmResponse};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

/// What an automated dialogue does when a backend call fails.
///
/// Parsing ignores case and surrounding whitespace, for both `FromStr` and
/// deserialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum DialogueFailurePolicy {
    /// Feed the error text forward as the next message.
    #[default]
    Continue,
    /// Stop at the first failed line.
    Abort,
}

impl fmt::Display for DialogueFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => f.write_str("continue"),
            Self::Abort => f.write_str("abort"),
        }
    }
}

impl FromStr for DialogueFailurePolicy {
    type Err = ConversationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "abort" => Ok(Self::Abort),
            _ => Err(ConversationError::UnknownFailurePolicy {
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for DialogueFailurePolicy {
    type Error = ConversationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Token cap for primary backend requests.
    pub max_tokens: u32,
    /// Sampling temperature sent to both backends; provider default if unset.
    pub temperature: Option<f32>,
    /// Templates for automated dialogues.
    pub prompts: DialoguePrompts,
    /// Failure handling for automated dialogues.
    pub failure_policy: DialogueFailurePolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            prompts: DialoguePrompts::default(),
            failure_policy: DialogueFailurePolicy::default(),
        }
    }
}

/// Routes user turns to two backends and records the exchanges.
pub struct TurnOrchestrator {
    primary: Box<dyn LlmBackend>,
    secondary: Box<dyn LlmBackend>,
    session: ChatSession,
    config: OrchestratorConfig,
}

impl fmt::Debug for TurnOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnOrchestrator")
            .field("primary", &self.primary.provider())
            .field("secondary", &self.secondary.provider())
            .field("session", &self.session.id)
            .field("config", &self.config)
            .finish()
    }
}

impl TurnOrchestrator {
    /// Creates an orchestrator over a primary (history-replaying) and a
    /// secondary (session-keeping) backend.
    #[must_use]
    pub fn new(
        primary: Box<dyn LlmBackend>,
        secondary: Box<dyn LlmBackend>,
        session: ChatSession,
    ) -> Self {
        Self {
            primary,
            secondary,
            session,
            config: OrchestratorConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Sends one user turn to the selected backend(s).
    ///
    /// With [`ChatTarget::Both`] the primary backend is called first and
    /// its failure does not prevent the secondary call. An unrecognized
    /// target calls nothing and yields an empty reply.
    #[instrument(skip(self, input, target), fields(session = %self.session.id, target = %target))]
    pub async fn process_conversation(&mut self, input: &str, target: &ChatTarget) -> Reply {
        let mut lines = Vec::with_capacity(2);

        if target.includes_primary() {
            lines.push(self.primary_turn(input).await);
        }
        if target.includes_secondary() {
            lines.push(self.secondary_turn(input).await);
        }
        if lines.is_empty() {
            warn!("target names no backend; nothing sent");
        }

        self.session.touch();
        Reply::new(lines)
    }

    async fn primary_turn(&mut self, input: &str) -> TaggedLine {
        let provider = self.primary.provider();
        self.session.primary_mut().push_user(input);

        let request = self.sampled(
            LlmRequest::from_history(self.session.primary().to_llm_messages())
                .with_max_tokens(self.config.max_tokens),
        );

        match self.primary.send(&request).await {
            Ok(response) if has_text(&response) => {
                debug!(
                    %provider,
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    tool_invocations = response.tool_invocations,
                    "primary reply received"
                );
                self.session.primary_mut().push_assistant(&response.content);
                TaggedLine::reply(provider, response.content)
            }
            Ok(_) => {
                warn!(%provider, "primary backend returned empty text");
                TaggedLine::no_response(provider)
            }
            Err(error) => {
                warn!(%provider, %error, "primary backend call failed");
                TaggedLine::failed(provider, error)
            }
        }
    }

    async fn secondary_turn(&mut self, input: &str) -> TaggedLine {
        let provider = self.secondary.provider();
        let request = self.sampled(LlmRequest::new(input));

        match self.secondary.send(&request).await {
            Ok(response) if has_text(&response) => {
                debug!(
                    %provider,
                    output_tokens = response.usage.output_tokens,
                    "secondary reply received"
                );
                let mirror = self.session.mirror_mut();
                mirror.push_user(input);
                mirror.push_assistant(&response.content);
                TaggedLine::reply(provider, response.content)
            }
            Ok(_) => {
                warn!(%provider, "secondary backend returned empty text");
                TaggedLine::no_response(provider)
            }
            Err(error) => {
                warn!(%provider, %error, "secondary backend call failed");
                TaggedLine::failed(provider, error)
            }
        }
    }

    /// Runs an automated dialogue of `turns` rounds on `topic`.
    ///
    /// Each round prompts the primary backend with the previous message
    /// (the topic itself on the first round), then prompts the secondary
    /// backend with the primary's answer.
    #[instrument(skip(self), fields(session = %self.session.id))]
    pub async fn run_dialogue(&mut self, topic: &str, turns: usize) -> Transcript {
        let mut transcript = Transcript::new(topic);
        let primary = self.primary.provider();
        let secondary = self.secondary.provider();
        let mut previous = topic.to_string();

        info!(dialogue = %transcript.id, turns, "starting dialogue");

        for turn in 0..turns {
            let prompt = self.config.prompts.opener_for(topic, &previous);
            let first = self
                .process_conversation(&prompt, &ChatTarget::for_provider(primary))
                .await
                .into_line_for(primary);

            if first.is_failure() && self.config.failure_policy == DialogueFailurePolicy::Abort {
                warn!(turn, "primary line failed; aborting dialogue");
                transcript.push_turn(DialogueTurn {
                    primary: first,
                    secondary: None,
                });
                transcript.abort();
                break;
            }

            let prompt = self
                .config
                .prompts
                .reply_for(topic, primary.label(), &first.text);
            let second = self
                .process_conversation(&prompt, &ChatTarget::for_provider(secondary))
                .await
                .into_line_for(secondary);

            previous.clone_from(&second.text);
            let failed = second.is_failure();
            transcript.push_turn(DialogueTurn {
                primary: first,
                secondary: Some(second),
            });

            if failed && self.config.failure_policy == DialogueFailurePolicy::Abort {
                warn!(turn, "secondary line failed; aborting dialogue");
                transcript.abort();
                break;
            }
        }

        info!(
            dialogue = %transcript.id,
            completed = transcript.turns().len(),
            aborted = transcript.is_aborted(),
            "dialogue finished"
        );
        transcript
    }

    /// Restores the primary history to its seed, clears the mirror and
    /// drops the secondary backend's session context.
    #[instrument(skip(self), fields(session = %self.session.id))]
    pub async fn reset_history(&mut self) {
        self.session.reset();
        self.secondary.reset_session().await;
        info!("conversation history reset");
    }

    fn sampled(&self, request: LlmRequest) -> LlmRequest {
        match self.config.temperature {
            Some(temperature) => request.with_temperature(temperature),
            None => request,
        }
    }
}

fn has_text(response: &LlmResponse) -> bool {
    !response.content.trim().is_empty()
}

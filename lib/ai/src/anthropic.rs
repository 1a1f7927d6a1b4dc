//! Anthropic Messages API backend.
//!
//! The Messages API keeps no state between calls, so every request replays
//! the full history it is given. When the model asks for a tool, the call is
//! dispatched through the local [`ToolRegistry`] and the result is sent back
//! in a follow-up request; those exchange blocks stay inside this module and
//! never reach the caller's history.

use crate::backend::{LlmBackend, LlmMessage, LlmProvider, LlmRequest, LlmResponse, TokenUsage};
use crate::error::{LlmError, ToolError};
use crate::tool::{DEFAULT_MAX_TOOL_ROUNDS, ToolRegistry};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use tracing::{debug, instrument, warn};

/// Default API origin.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
/// Default model.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
/// Default cap on generated tokens per call.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
/// System prompt sent when no identity is configured.
pub const DEFAULT_IDENTITY: &str = "You are a friendly and knowledgeable customer support \
assistant for an auto insurance company. Answer questions about coverage and, when the customer \
wants a price, gather the vehicle details and use the get_quote tool to calculate a quote.";

const MESSAGES_PATH: &str = "/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const STOP_TOOL_USE: &str = "tool_use";

/// Backend for the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicBackend {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    identity: String,
    max_tokens: u32,
    max_tool_rounds: u32,
    tools: ToolRegistry,
}

impl fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicBackend")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

impl AnthropicBackend {
    /// Creates a backend with the provided API key and model.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            identity: DEFAULT_IDENTITY.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            tools: ToolRegistry::new(),
        }
    }

    /// Creates a backend from `ANTHROPIC_API_KEY` with the default model.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::MissingCredential`] if the variable is unset or
    /// empty.
    pub fn from_env() -> parley_core::Result<Self, LlmError> {
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::MissingCredential {
                provider: LlmProvider::Anthropic,
                variable: API_KEY_VAR.to_string(),
            })?;
        Ok(Self::new(api_key, DEFAULT_MODEL))
    }

    /// Replaces the model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Replaces the HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Overrides the API origin.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replaces the identity text sent as the system prompt.
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Sets the default cap on generated tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the number of tool round trips allowed per call.
    #[must_use]
    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Declares the tools the model may call.
    #[must_use]
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Returns the identity text sent as the system prompt.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    fn build_request(&self, request: &LlmRequest) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            system: request.system.clone().unwrap_or_else(|| self.identity.clone()),
            temperature: request.temperature,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            tools: self.tools.to_anthropic_format(),
        }
    }

    async fn post(&self, body: &MessagesRequest) -> Result<MessagesResponse, LlmError> {
        let response = self
            .client
            .post(format!("{}{MESSAGES_PATH}", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|err| LlmError::RequestFailed {
                reason: err.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|err| LlmError::RequestFailed {
            reason: format!("failed to read response body: {err}"),
        })?;

        if !status.is_success() {
            return Err(map_http_error(status, &text));
        }

        serde_json::from_str(&text).map_err(|err| LlmError::ResponseParseFailed {
            reason: err.to_string(),
        })
    }

    /// Runs every `tool_use` block and returns the matching `tool_result`
    /// blocks. Unknown tools abort the turn; other tool failures are reported
    /// back to the model so it can recover.
    fn run_tools(&self, content: &[ContentBlock]) -> Result<Vec<ContentBlock>, LlmError> {
        let mut results = Vec::new();
        for block in content {
            let ContentBlock::ToolUse { id, name, input } = block else {
                continue;
            };
            let result = match self.tools.dispatch(name, input) {
                Ok(output) => ContentBlock::ToolResult {
                    tool_use_id: id.clone(),
                    content: output,
                    is_error: false,
                },
                Err(err @ ToolError::NotFound { .. }) => return Err(err.into()),
                Err(err) => {
                    warn!(tool = %name, error = %err, "tool call failed");
                    ContentBlock::ToolResult {
                        tool_use_id: id.clone(),
                        content: err.to_string(),
                        is_error: true,
                    }
                }
            };
            results.push(result);
        }
        Ok(results)
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    #[instrument(skip_all, fields(model = %self.model, messages = request.messages.len()))]
    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut body = self.build_request(request);
        let mut usage = TokenUsage::default();
        let mut tool_invocations = 0;

        for round in 0..=self.max_tool_rounds {
            let response = self.post(&body).await?;
            usage.accumulate(response.usage.into());

            if response.stop_reason.as_deref() != Some(STOP_TOOL_USE) {
                let content = response.text().ok_or(LlmError::EmptyResponse {
                    provider: LlmProvider::Anthropic,
                })?;
                debug!(round, tool_invocations, "received reply");
                return Ok(LlmResponse {
                    content,
                    usage,
                    model: response.model.unwrap_or_else(|| self.model.clone()),
                    tool_invocations,
                });
            }

            if round == self.max_tool_rounds {
                break;
            }

            let results = self.run_tools(&response.content)?;
            tool_invocations += u32::try_from(results.len()).unwrap_or(u32::MAX);
            debug!(round, calls = results.len(), "answered tool calls");

            body.messages.push(WireMessage {
                role: "assistant",
                content: response
                    .content
                    .into_iter()
                    .filter(|block| !matches!(block, ContentBlock::Other))
                    .collect(),
            });
            body.messages.push(WireMessage {
                role: "user",
                content: results,
            });
        }

        Err(LlmError::ToolLoopExceeded {
            max_rounds: self.max_tool_rounds,
        })
    }

    fn provider(&self) -> LlmProvider {
        LlmProvider::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<JsonValue>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

impl From<&LlmMessage> for WireMessage {
    fn from(message: &LlmMessage) -> Self {
        let role = match message.role {
            crate::backend::MessageRole::User => "user",
            crate::backend::MessageRole::Assistant => "assistant",
        };
        Self {
            role,
            content: vec![ContentBlock::Text {
                text: message.content.clone(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: JsonValue,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: WireUsage,
}

impl MessagesResponse {
    fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        (!parts.is_empty()).then(|| parts.concat())
    }
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl From<WireUsage> for TokenUsage {
    fn from(usage: WireUsage) -> Self {
        Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        }
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn map_http_error(status: StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.to_string());

    LlmError::Api {
        status: status.as_u16(),
        message,
    }
}

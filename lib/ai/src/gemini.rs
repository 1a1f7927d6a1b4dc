//! Gemini `generateContent` backend.
//!
//! The backend owns a chat session: every successful exchange is appended to
//! it and replayed on the next call, so callers only hand over the newest
//! message. A failed call leaves the session untouched.
//!
//! Registered tools are offered as `functionDeclarations`. A `functionCall`
//! part is answered with a `functionResponse` part in a follow-up request,
//! and the whole exchange joins the session once the model replies in text.

use crate::backend::{LlmBackend, LlmProvider, LlmRequest, LlmResponse, TokenUsage};
use crate::error::{LlmError, ToolError};
use crate::tool::{DEFAULT_MAX_TOOL_ROUNDS, ToolRegistry};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Default model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";
/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Backend for the Gemini API with a client-held chat session.
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    system_instruction: Option<String>,
    tools: ToolRegistry,
    max_tool_rounds: u32,
    session: Mutex<Vec<Content>>,
}

impl fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("tools", &self.tools)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .finish_non_exhaustive()
    }
}

impl GeminiBackend {
    /// Creates a backend with the provided API key and model.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            system_instruction: None,
            tools: ToolRegistry::new(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            session: Mutex::new(Vec::new()),
        }
    }

    /// Creates a backend from `GEMINI_API_KEY` with the default model.
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
                provider: LlmProvider::Gemini,
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

    /// Overrides the API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets a system instruction sent with every request.
    #[must_use]
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Registers the tools the model may call.
    #[must_use]
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the number of tool round trips allowed per call.
    #[must_use]
    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Returns the tools offered to the model.
    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Returns the number of function-call round trips allowed per call.
    #[must_use]
    pub fn max_tool_rounds(&self) -> u32 {
        self.max_tool_rounds
    }

    /// Returns the number of turns (user and model) held in the session.
    pub async fn session_len(&self) -> usize {
        self.session.lock().await.len()
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn post(
        &self,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
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

    /// Runs every `functionCall` part and returns the matching
    /// `functionResponse` parts. Unknown tools abort the turn; other tool
    /// failures are reported back to the model.
    fn run_tools(&self, calls: &[&FunctionCall]) -> Result<Vec<Part>, LlmError> {
        let mut parts = Vec::with_capacity(calls.len());
        for call in calls {
            let response = match self.tools.dispatch(&call.name, &call.args) {
                Ok(output) => serde_json::json!({ "content": output }),
                Err(err @ ToolError::NotFound { .. }) => return Err(err.into()),
                Err(err) => {
                    warn!(tool = %call.name, error = %err, "tool call failed");
                    serde_json::json!({ "error": err.to_string() })
                }
            };
            parts.push(Part {
                function_response: Some(FunctionResponse {
                    name: call.name.clone(),
                    response,
                }),
                ..Part::default()
            });
        }
        Ok(parts)
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let prompt = request
            .latest_user_message()
            .ok_or_else(|| LlmError::InvalidConfig {
                reason: "request carries no user message".to_string(),
            })?;

        let mut session = self.session.lock().await;
        let user_turn = Content::text("user", &prompt.content);

        let mut contents = session.clone();
        contents.push(user_turn.clone());
        let mut exchange = vec![user_turn];

        let generation_config = (request.max_tokens.is_some() || request.temperature.is_some())
            .then_some(GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            });

        let mut body = GenerateContentRequest {
            contents,
            tools: self.tools.to_gemini_format(),
            system_instruction: request
                .system
                .as_deref()
                .or(self.system_instruction.as_deref())
                .map(|text| Content::text("system", text)),
            generation_config,
        };

        let mut usage = TokenUsage::default();
        let mut tool_invocations = 0;

        for round in 0..=self.max_tool_rounds {
            let response = self.post(&body).await?;
            usage.accumulate(response.usage());

            let calls = response.function_calls();
            if calls.is_empty() {
                let content = response.text().ok_or(LlmError::EmptyResponse {
                    provider: LlmProvider::Gemini,
                })?;
                exchange.push(Content::text("model", &content));
                session.extend(exchange);
                debug!(round, tool_invocations, session_turns = session.len(), "received reply");
                return Ok(LlmResponse {
                    content,
                    usage,
                    model: self.model.clone(),
                    tool_invocations,
                });
            }

            if round == self.max_tool_rounds {
                break;
            }

            let results = self.run_tools(&calls)?;
            tool_invocations += u32::try_from(results.len()).unwrap_or(u32::MAX);
            debug!(round, calls = results.len(), "answered function calls");

            let model_turn = Content {
                role: Some("model".to_string()),
                parts: calls
                    .into_iter()
                    .map(|call| Part {
                        function_call: Some(call.clone()),
                        ..Part::default()
                    })
                    .collect(),
            };
            let tool_turn = Content {
                role: Some("user".to_string()),
                parts: results,
            };
            body.contents.push(model_turn.clone());
            body.contents.push(tool_turn.clone());
            exchange.push(model_turn);
            exchange.push(tool_turn);
        }

        Err(LlmError::ToolLoopExceeded {
            max_rounds: self.max_tool_rounds,
        })
    }

    fn provider(&self) -> LlmProvider {
        LlmProvider::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn reset_session(&self) {
        self.session.lock().await.clear();
        debug!("gemini session cleared");
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part {
                text: Some(text.to_string()),
                ..Part::default()
            }],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: JsonValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let parts: Vec<&str> = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        (!parts.is_empty()).then(|| parts.concat())
    }

    fn function_calls(&self) -> Vec<&FunctionCall> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.function_call.as_ref())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn usage(&self) -> TokenUsage {
        self.usage_metadata
            .as_ref()
            .map(|meta| TokenUsage {
                input_tokens: meta.prompt_token_count,
                output_tokens: meta.candidates_token_count,
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn map_http_error(status: StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .and_then(|wrapper| {
            let msg = wrapper.error.message?;
            Some(match wrapper.error.status {
                Some(code) if !code.is_empty() => format!("{code}: {msg}"),
                _ => msg,
            })
        })
        .unwrap_or_else(|| body.to_string());

    LlmError::Api {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LlmMessage;
    use crate::quote::QuoteTool;
    use crate::testing::{StubServer, client};

    fn reply(text: &str) -> String {
        serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 7, "candidatesTokenCount": 3 }
        })
        .to_string()
    }

    fn call_reply(name: &str, args: serde_json::Value) -> String {
        serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "functionCall": { "name": name, "args": args } }]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 5 }
        })
        .to_string()
    }

    fn backend(server: &StubServer) -> GeminiBackend {
        GeminiBackend::new("g-key", "gemini-test")
            .with_client(client())
            .with_base_url(&server.base_url)
    }

    #[test]
    fn response_text_concatenates_parts() {
        let parsed: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hel" }, { "text": "lo" }] } }]
        }))
        .expect("parse");
        assert_eq!(parsed.text().as_deref(), Some("Hello"));
        assert_eq!(parsed.usage(), TokenUsage::default());
    }

    #[test]
    fn empty_candidates_have_no_text() {
        let parsed: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": []}"#).expect("parse");
        assert!(parsed.text().is_none());
    }

    #[test]
    fn http_error_includes_status_code_name() {
        let err = map_http_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#,
        );
        assert_eq!(
            err,
            LlmError::Api {
                status: 400,
                message: "INVALID_ARGUMENT: API key not valid.".to_string()
            }
        );
    }

    #[test]
    fn endpoint_includes_model() {
        let backend = GeminiBackend::new("k", "gemini-1.5-flash-latest").with_base_url("http://x/");
        assert_eq!(
            backend.endpoint(),
            "http://x/models/gemini-1.5-flash-latest:generateContent"
        );
    }

    #[tokio::test]
    async fn session_replays_previous_turns() {
        let server = StubServer::start(vec![(200, reply("Hi!")), (200, reply("Sure."))]).await;
        let backend = backend(&server);

        let first = backend
            .send(&LlmRequest::new("Hello"))
            .await
            .expect("first send");
        assert_eq!(first.content, "Hi!");
        assert_eq!(first.usage.total(), 10);

        let second = backend
            .send(&LlmRequest::from_history(vec![
                LlmMessage::user("ignored"),
                LlmMessage::assistant("ignored"),
                LlmMessage::user("Tell me more"),
            ]))
            .await
            .expect("second send");
        assert_eq!(second.content, "Sure.");
        assert_eq!(backend.session_len().await, 4);

        let requests = server.requests();
        assert_eq!(requests[0].header("x-goog-api-key"), Some("g-key"));
        assert!(requests[0].request_line.contains("/models/gemini-test:generateContent"));

        let contents = requests[1].body["contents"].as_array().expect("contents");
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["parts"][0]["text"], "Hello");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "Tell me more");
        assert!(requests[0].body.get("tools").is_none());
    }

    #[tokio::test]
    async fn send_answers_function_calls() {
        let server = StubServer::start(vec![
            (
                200,
                call_reply(
                    "get_quote",
                    serde_json::json!({
                        "make": "Toyota", "model": "Camry", "year": 2020, "zip_code": "60601"
                    }),
                ),
            ),
            (200, reply("Your premium is $107.50 per month.")),
        ])
        .await;
        let backend = backend(&server).with_tools(ToolRegistry::new().with_tool(QuoteTool));

        let response = backend
            .send(&LlmRequest::new("Quote my Camry"))
            .await
            .expect("send succeeds");

        assert_eq!(response.content, "Your premium is $107.50 per month.");
        assert_eq!(response.tool_invocations, 1);
        assert_eq!(response.usage.total(), 27);
        assert_eq!(backend.session_len().await, 4);

        let requests = server.requests();
        assert_eq!(
            requests[0].body["tools"][0]["functionDeclarations"][0]["name"],
            "get_quote"
        );
        let contents = requests[1].body["contents"].as_array().expect("contents");
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["parts"][0]["functionCall"]["name"], "get_quote");
        let answer = &contents[2]["parts"][0]["functionResponse"];
        assert_eq!(answer["name"], "get_quote");
        assert_eq!(
            answer["response"]["content"],
            "Quote generated: $107.50 per month"
        );
    }

    #[tokio::test]
    async fn unknown_function_fails_the_turn() {
        let server = StubServer::start(vec![(
            200,
            call_reply("launch_rocket", serde_json::json!({})),
        )])
        .await;
        let backend = backend(&server).with_tools(ToolRegistry::new().with_tool(QuoteTool));

        let err = backend.send(&LlmRequest::new("go")).await.unwrap_err();

        assert_eq!(
            err,
            LlmError::UnknownTool {
                name: "launch_rocket".to_string()
            }
        );
        assert_eq!(server.requests().len(), 1);
        assert_eq!(backend.session_len().await, 0);
    }

    #[tokio::test]
    async fn function_loop_is_bounded() {
        let looping = call_reply("get_quote", serde_json::json!({}));
        let server = StubServer::start(vec![(200, looping.clone()), (200, looping)]).await;
        let backend = backend(&server)
            .with_tools(ToolRegistry::new().with_tool(QuoteTool))
            .with_max_tool_rounds(1);

        let err = backend.send(&LlmRequest::new("go")).await.unwrap_err();

        assert_eq!(err, LlmError::ToolLoopExceeded { max_rounds: 1 });
        assert_eq!(backend.session_len().await, 0);
        let second = &server.requests()[1].body;
        let answer = &second["contents"][2]["parts"][0]["functionResponse"];
        assert!(answer["response"]["error"].is_string());
    }

    #[tokio::test]
    async fn failed_call_leaves_session_untouched() {
        let server = StubServer::start(vec![(
            503,
            r#"{"error":{"code":503,"message":"overloaded","status":"UNAVAILABLE"}}"#.to_string(),
        )])
        .await;
        let backend = backend(&server);

        let err = backend.send(&LlmRequest::new("Hello")).await.unwrap_err();
        assert!(err.is_transport_error());
        assert_eq!(backend.session_len().await, 0);
    }

    #[tokio::test]
    async fn empty_reply_is_an_error() {
        let server = StubServer::start(vec![(200, r#"{"candidates":[]}"#.to_string())]).await;
        let err = backend(&server)
            .send(&LlmRequest::new("Hello"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LlmError::EmptyResponse {
                provider: LlmProvider::Gemini
            }
        );
    }

    #[tokio::test]
    async fn reset_clears_session() {
        let server = StubServer::start(vec![(200, reply("Hi!"))]).await;
        let backend = backend(&server);
        backend.send(&LlmRequest::new("Hello")).await.expect("send");
        assert_eq!(backend.session_len().await, 2);

        backend.reset_session().await;
        assert_eq!(backend.session_len().await, 0);
    }

    #[tokio::test]
    async fn request_without_user_message_is_rejected() {
        let backend = GeminiBackend::new("k", "m");
        let err = backend
            .send(&LlmRequest::default())
            .await
            .unwrap_err();
        assert!(err.is_configuration_error());
    }
}

//! Centralized CLI configuration.
//!
//! Loaded via the `config` crate from an optional TOML file and then from
//! `PARLEY__`-prefixed environment variables, e.g.
//! `PARLEY__ANTHROPIC__MODEL=claude-3-5-haiku-latest`. API keys fall back to
//! `ANTHROPIC_API_KEY` and `GEMINI_API_KEY` when not configured here.

use crate::error::CliError;
use parley_ai::{
    AnthropicBackend, DialoguePrompts, GeminiBackend, LlmBackend, PromptTemplate, QuoteTool,
    ToolRegistry,
};
use parley_conversation::{
    ChatSession, DEFAULT_INSTRUCTIONS, DialogueFailurePolicy, OrchestratorConfig, TurnOrchestrator,
};
use rootcause::Report;
use serde::Deserialize;
use std::path::Path;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "parley";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "PARLEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub dialogue: DialogueConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Primary backend settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicConfig {
    /// API key; falls back to `ANTHROPIC_API_KEY`.
    pub api_key: Option<String>,

    #[serde(default = "default_anthropic_model")]
    pub model: String,

    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,

    /// Token cap per request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Tool round-trips allowed per turn.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    /// System prompt describing who the assistant is.
    #[serde(default = "default_identity")]
    pub identity: String,
}

/// Secondary backend settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    /// API key; falls back to `GEMINI_API_KEY`.
    pub api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Function-call round-trips allowed per turn.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    pub system_instruction: Option<String>,
}

/// Automated dialogue settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DialogueConfig {
    /// Primary prompt template; sees `{{topic}}` and `{{message}}`.
    #[serde(default = "default_opener")]
    pub opener: String,

    /// Secondary prompt template; also sees `{{peer}}`.
    #[serde(default = "default_reply")]
    pub reply: String,

    #[serde(default)]
    pub failure_policy: DialogueFailurePolicy,

    /// Rounds run when `--turns` is not given.
    #[serde(default = "default_turns")]
    pub turns: usize,
}

/// Chat session settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Instructions primed into every new history.
    #[serde(default = "default_instructions")]
    pub instructions: String,

    /// Sampling temperature for both backends; unset keeps provider defaults.
    pub temperature: Option<f32>,
}

fn default_anthropic_model() -> String {
    parley_ai::anthropic::DEFAULT_MODEL.to_string()
}

fn default_anthropic_base_url() -> String {
    parley_ai::anthropic::DEFAULT_BASE_URL.to_string()
}

fn default_max_tokens() -> u32 {
    parley_ai::anthropic::DEFAULT_MAX_TOKENS
}

fn default_max_tool_rounds() -> u32 {
    parley_ai::tool::DEFAULT_MAX_TOOL_ROUNDS
}

fn default_identity() -> String {
    parley_ai::anthropic::DEFAULT_IDENTITY.to_string()
}

fn default_gemini_model() -> String {
    parley_ai::gemini::DEFAULT_MODEL.to_string()
}

fn default_gemini_base_url() -> String {
    parley_ai::gemini::DEFAULT_BASE_URL.to_string()
}

fn default_opener() -> String {
    parley_ai::prompt::DEFAULT_OPENER.to_string()
}

fn default_reply() -> String {
    parley_ai::prompt::DEFAULT_REPLY.to_string()
}

fn default_turns() -> usize {
    3
}

fn default_instructions() -> String {
    DEFAULT_INSTRUCTIONS.to_string()
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_anthropic_model(),
            base_url: default_anthropic_base_url(),
            max_tokens: default_max_tokens(),
            max_tool_rounds: default_max_tool_rounds(),
            identity: default_identity(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
            max_tool_rounds: default_max_tool_rounds(),
            system_instruction: None,
        }
    }
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            opener: default_opener(),
            reply: default_reply(),
            failure_policy: DialogueFailurePolicy::default(),
            turns: default_turns(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            instructions: default_instructions(),
            temperature: None,
        }
    }
}

impl ParleyConfig {
    /// Loads configuration from `path` (or `./parley.toml` if present) and
    /// the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing or any value fails
    /// to parse.
    pub fn load(path: Option<&Path>) -> Result<Self, Report<CliError>> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(CliError::from)?
            .try_deserialize()
            .map_err(CliError::from)?;

        Ok(config)
    }

    /// Orchestrator settings derived from this configuration.
    #[must_use]
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_tokens: self.anthropic.max_tokens,
            temperature: self.session.temperature,
            prompts: DialoguePrompts {
                opener: PromptTemplate::new("dialogue_opener", &self.dialogue.opener),
                reply: PromptTemplate::new("dialogue_reply", &self.dialogue.reply),
            },
            failure_policy: self.dialogue.failure_policy,
        }
    }

    /// Builds the primary backend with the quote tool registered.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured or in the environment.
    pub fn anthropic_backend(&self) -> Result<AnthropicBackend, Report<CliError>> {
        let settings = &self.anthropic;
        let backend = match non_empty(settings.api_key.as_deref()) {
            Some(key) => AnthropicBackend::new(key, &settings.model),
            None => AnthropicBackend::from_env()
                .map_err(|report| report.context(CliError::Backend { provider: "Claude" }))?
                .with_model(&settings.model),
        };

        Ok(backend
            .with_base_url(&settings.base_url)
            .with_identity(&settings.identity)
            .with_max_tokens(settings.max_tokens)
            .with_max_tool_rounds(settings.max_tool_rounds)
            .with_tools(ToolRegistry::new().with_tool(QuoteTool)))
    }

    /// Builds the secondary backend with the quote tool registered.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured or in the environment.
    pub fn gemini_backend(&self) -> Result<GeminiBackend, Report<CliError>> {
        let settings = &self.gemini;
        let backend = match non_empty(settings.api_key.as_deref()) {
            Some(key) => GeminiBackend::new(key, &settings.model),
            None => GeminiBackend::from_env()
                .map_err(|report| report.context(CliError::Backend { provider: "Gemini" }))?
                .with_model(&settings.model),
        };

        let mut backend = backend
            .with_base_url(&settings.base_url)
            .with_max_tool_rounds(settings.max_tool_rounds)
            .with_tools(ToolRegistry::new().with_tool(QuoteTool));
        if let Some(instruction) = &settings.system_instruction {
            backend = backend.with_system_instruction(instruction);
        }
        Ok(backend)
    }

    /// Builds an orchestrator over both backends with a fresh session.
    ///
    /// # Errors
    ///
    /// Returns an error if either backend cannot be built.
    pub fn build_orchestrator(&self) -> Result<TurnOrchestrator, Report<CliError>> {
        let primary: Box<dyn LlmBackend> = Box::new(self.anthropic_backend()?);
        let secondary: Box<dyn LlmBackend> = Box::new(self.gemini_backend()?);
        let session = ChatSession::new(&self.session.instructions);

        Ok(TurnOrchestrator::new(primary, secondary, session)
            .with_config(self.orchestrator_config()))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("create temp config");
        file.write_all(contents.as_bytes()).expect("write temp config");
        file
    }

    #[test]
    fn defaults_match_backend_defaults() {
        let config = ParleyConfig::default();
        assert_eq!(config.anthropic.max_tokens, 2048);
        assert_eq!(config.anthropic.model, parley_ai::anthropic::DEFAULT_MODEL);
        assert_eq!(config.gemini.model, parley_ai::gemini::DEFAULT_MODEL);
        assert_eq!(config.dialogue.turns, 3);
        assert_eq!(config.dialogue.failure_policy, DialogueFailurePolicy::Continue);
        assert_eq!(config.session.instructions, DEFAULT_INSTRUCTIONS);
        assert_eq!(config.anthropic.identity, parley_ai::anthropic::DEFAULT_IDENTITY);
    }

    #[test]
    fn loads_values_from_file() {
        let file = write_config(
            r#"
[anthropic]
api_key = "file-key"
model = "claude-test"
max_tokens = 512
identity = "You are a careful insurance agent."

[dialogue]
failure_policy = "abort"
turns = 5

[session]
instructions = "Keep it short."
"#,
        );

        let config = ParleyConfig::load(Some(file.path())).expect("load config");

        assert_eq!(config.anthropic.api_key.as_deref(), Some("file-key"));
        assert_eq!(config.anthropic.model, "claude-test");
        assert_eq!(config.anthropic.max_tokens, 512);
        assert_eq!(config.anthropic.identity, "You are a careful insurance agent.");
        assert_eq!(config.dialogue.failure_policy, DialogueFailurePolicy::Abort);
        assert_eq!(config.dialogue.turns, 5);
        assert_eq!(config.session.instructions, "Keep it short.");
        assert_eq!(config.gemini.base_url, parley_ai::gemini::DEFAULT_BASE_URL);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("absent.toml");
        assert!(ParleyConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn failure_policy_ignores_case() {
        let file = write_config("[dialogue]\nfailure_policy = \"Abort\"\n");
        let config = ParleyConfig::load(Some(file.path())).expect("load config");
        assert_eq!(config.dialogue.failure_policy, DialogueFailurePolicy::Abort);
    }

    #[test]
    fn invalid_failure_policy_is_an_error() {
        let file = write_config("[dialogue]\nfailure_policy = \"retry\"\n");
        assert!(ParleyConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn orchestrator_config_carries_templates() {
        let mut config = ParleyConfig::default();
        config.dialogue.reply = "{{peer}} said {{message}}".to_string();
        config.anthropic.max_tokens = 100;
        config.session.temperature = Some(0.2);

        let orchestrator = config.orchestrator_config();

        assert_eq!(orchestrator.max_tokens, 100);
        assert_eq!(orchestrator.temperature, Some(0.2));
        assert_eq!(
            orchestrator.prompts.reply_for("tea", "Claude", "hi"),
            "Claude said hi"
        );
    }

    #[test]
    fn primary_backend_uses_configured_identity() {
        let mut config = ParleyConfig::default();
        config.anthropic.api_key = Some("a-key".to_string());

        let backend = config.anthropic_backend().expect("build backend");
        assert_eq!(backend.identity(), parley_ai::anthropic::DEFAULT_IDENTITY);

        config.anthropic.identity = "You quote premiums.".to_string();
        let backend = config.anthropic_backend().expect("build backend");
        assert_eq!(backend.identity(), "You quote premiums.");
    }

    #[test]
    fn secondary_backend_offers_quote_tool() {
        let mut config = ParleyConfig::default();
        config.gemini.api_key = Some("g-key".to_string());

        let backend = config.gemini_backend().expect("build backend");

        assert!(backend.tools().get("get_quote").is_some());
        assert_eq!(
            backend.max_tool_rounds(),
            parley_ai::tool::DEFAULT_MAX_TOOL_ROUNDS
        );
    }

    #[test]
    fn builds_orchestrator_with_configured_keys() {
        let mut config = ParleyConfig::default();
        config.anthropic.api_key = Some("a-key".to_string());
        config.gemini.api_key = Some("g-key".to_string());

        let orchestrator = config.build_orchestrator().expect("build orchestrator");

        assert_eq!(orchestrator.session().primary().len(), 2);
        assert_eq!(orchestrator.config().max_tokens, 2048);
    }
}

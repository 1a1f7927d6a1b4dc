//! Error types for the AI crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `LlmError`: Backend calls (transport, remote API, tool dispatch)
//! - `ToolError`: Local tool execution
//!
//! Adapter constructors that read the environment return
//! `parley_core::Result<_, LlmError>` so the caller can attach context.

use crate::backend::LlmProvider;
use std::fmt;

/// Errors from LLM backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Required credential is not configured.
    MissingCredential {
        provider: LlmProvider,
        variable: String,
    },
    /// Request could not be delivered.
    RequestFailed { reason: String },
    /// Remote API answered with a non-success status.
    Api { status: u16, message: String },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// Response contained no text.
    EmptyResponse { provider: LlmProvider },
    /// The model asked for a tool that is not registered.
    UnknownTool { name: String },
    /// A registered tool failed.
    ToolFailed { name: String, reason: String },
    /// The model kept requesting tools past the configured limit.
    ToolLoopExceeded { max_rounds: u32 },
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl LlmError {
    /// Returns true for errors caused by local configuration rather than a
    /// transient remote condition.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownTool { .. } | Self::MissingCredential { .. } | Self::InvalidConfig { .. }
        )
    }

    /// Returns true for errors raised while talking to the remote API.
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::RequestFailed { .. }
                | Self::Api { .. }
                | Self::ResponseParseFailed { .. }
                | Self::EmptyResponse { .. }
        )
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredential { provider, variable } => {
                write!(f, "{provider} credential missing: set {variable}")
            }
            Self::RequestFailed { reason } => {
                write!(f, "LLM request failed: {reason}")
            }
            Self::Api { status, message } => {
                write!(f, "API returned {status}: {message}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse LLM response: {reason}")
            }
            Self::EmptyResponse { provider } => {
                write!(f, "{provider} returned no text")
            }
            Self::UnknownTool { name } => {
                write!(f, "unexpected tool requested: {name}")
            }
            Self::ToolFailed { name, reason } => {
                write!(f, "tool '{name}' failed: {reason}")
            }
            Self::ToolLoopExceeded { max_rounds } => {
                write!(f, "model requested tools for more than {max_rounds} rounds")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid LLM configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}

/// Errors from local tool execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Tool not found.
    NotFound { name: String },
    /// Invalid tool input.
    InvalidInput { name: String, reason: String },
    /// Tool execution failed.
    ExecutionFailed { name: String, reason: String },
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { name } => write!(f, "tool not found: {name}"),
            Self::InvalidInput { name, reason } => {
                write!(f, "invalid input for tool '{name}': {reason}")
            }
            Self::ExecutionFailed { name, reason } => {
                write!(f, "tool '{name}' execution failed: {reason}")
            }
        }
    }
}

impl std::error::Error for ToolError {}

impl From<ToolError> for LlmError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound { name } => Self::UnknownTool { name },
            ToolError::InvalidInput { name, reason }
            | ToolError::ExecutionFailed { name, reason } => Self::ToolFailed { name, reason },
        }
    }
}

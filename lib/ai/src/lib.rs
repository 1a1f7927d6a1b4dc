//! LLM backends for parley.
//!
//! This crate provides:
//!
//! - **Backend contract**: [`LlmBackend`], the one interface the orchestrator
//!   drives every hosted model through
//! - **Adapters**: [`AnthropicBackend`] (stateless, full-history replay, tool
//!   use) and [`GeminiBackend`] (client-held chat session)
//! - **Tools**: a name-keyed [`ToolRegistry`] and the `get_quote` tool
//! - **Prompts**: the templates that drive automated dialogues

pub mod anthropic;
pub mod backend;
pub mod error;
pub mod gemini;
pub mod prompt;
pub mod quote;
pub mod tool;

#[cfg(test)]
mod testing;

pub use anthropic::AnthropicBackend;
pub use backend::{
    LlmBackend, LlmMessage, LlmProvider, LlmRequest, LlmResponse, MessageRole, TokenUsage,
};
pub use error::{LlmError, ToolError};
pub use gemini::GeminiBackend;
pub use prompt::{DialoguePrompts, PromptTemplate};
pub use quote::{Quote, QuoteTool};
pub use tool::{ToolDefinition, ToolHandler, ToolRegistry};

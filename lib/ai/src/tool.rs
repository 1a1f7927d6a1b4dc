//! Local tool registry.
//!
//! Tools are plain functions the remote model may ask to call. The
//! registry is keyed by tool name; a name that is not registered is a
//! configuration error for the turn that requested it.

use crate::error::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Default number of tool round trips a backend allows per call.
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 5;

/// Definition of a tool offered to a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema for input parameters.
    pub input_schema: JsonValue,
}

impl ToolDefinition {
    /// Creates a new tool definition with an empty object schema.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    /// Sets the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: JsonValue) -> Self {
        self.input_schema = schema;
        self
    }
}

/// Trait for local tool execution.
pub trait ToolHandler: Send + Sync {
    /// Returns the tool definition.
    fn definition(&self) -> ToolDefinition;

    /// Executes the tool and returns the text handed back to the model.
    ///
    /// # Errors
    ///
    /// Returns an error if the input does not match the schema or the tool
    /// cannot produce a value.
    fn call(&self, input: &JsonValue) -> Result<String, ToolError>;
}

/// Registry of available tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

impl ToolRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under its definition's name, replacing any previous
    /// tool with that name.
    pub fn register(&mut self, handler: impl ToolHandler + 'static) {
        let name = handler.definition().name;
        self.handlers.insert(name, Arc::new(handler));
    }

    /// Registers a tool, builder style.
    #[must_use]
    pub fn with_tool(mut self, handler: impl ToolHandler + 'static) -> Self {
        self.register(handler);
        self
    }

    /// Gets a tool definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ToolDefinition> {
        self.handlers.get(name).map(|h| h.definition())
    }

    /// Returns all registered tool definitions, sorted by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.handlers.values().map(|h| h.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Dispatches a tool invocation by name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] for unregistered names, otherwise
    /// whatever the tool itself reports.
    pub fn dispatch(&self, name: &str, input: &JsonValue) -> Result<String, ToolError> {
        let handler = self.handlers.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
        })?;
        debug!(tool = name, "dispatching tool call");
        handler.call(input)
    }

    /// Converts definitions to the `tools` array of the Anthropic Messages API.
    #[must_use]
    pub fn to_anthropic_format(&self) -> Vec<JsonValue> {
        self.definitions()
            .into_iter()
            .map(|def| {
                serde_json::json!({
                    "name": def.name,
                    "description": def.description,
                    "input_schema": def.input_schema
                })
            })
            .collect()
    }

    /// Converts definitions to the `tools` array of the Gemini API: a single
    /// entry holding every `functionDeclarations` item, or nothing when the
    /// registry is empty.
    #[must_use]
    pub fn to_gemini_format(&self) -> Vec<JsonValue> {
        if self.is_empty() {
            return Vec::new();
        }
        let declarations: Vec<JsonValue> = self
            .definitions()
            .into_iter()
            .map(|def| {
                serde_json::json!({
                    "name": def.name,
                    "description": def.description,
                    "parameters": def.input_schema
                })
            })
            .collect();
        vec![serde_json::json!({ "functionDeclarations": declarations })]
    }
}

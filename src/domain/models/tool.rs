//! Tool definitions and per-request tool-call records.

use serde::{Deserialize, Serialize};

use super::message::ToolSpec;

/// How a tool is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Returns a canned result from configuration.
    Mock,
    /// Shipped with the crate (calculator, current_time, ...).
    Builtin,
    /// Registered programmatically by an embedding application.
    Internal,
}

/// A registered tool: unique name, description, parameter schema, and kind.
///
/// The handler itself lives in the registry; this is the declarative part
/// that is also advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the parameters object.
    pub parameters: serde_json::Value,
    pub kind: ToolKind,
    /// Per-tool execution timeout. Falls back to the registry default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ToolDefinition {
    /// Schema advertised to the language model.
    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Outcome of one tool execution, fed back to the model as the tool result.
///
/// Failures use the same envelope as successes so the model can self-correct
/// instead of the request aborting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tool_name: String,
}

impl ToolOutcome {
    pub fn success(tool_name: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            tool_name: tool_name.into(),
        }
    }

    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            tool_name: tool_name.into(),
        }
    }

    /// Wire form appended to the message history.
    pub fn to_message_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!("{{\"success\":false,\"tool_name\":\"{}\"}}", self.tool_name)
        })
    }
}

/// Record of one tool call inside a single request's loop. Scoped to the
/// request; discarded after the response is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub params: serde_json::Value,
    pub outcome: ToolOutcome,
    /// Zero-based loop iteration the call happened in.
    pub iteration: u32,
    pub elapsed_ms: u64,
}

//! Domain errors for the Arbiter routing pipeline.

use thiserror::Error;

/// Domain-level errors that can occur while routing a conversational turn.
///
/// Load-time defects (`Configuration`) are fatal before the pipeline ever
/// runs. Tool-level failures (`ToolNotFound`, `InvalidParameters`,
/// `ToolTimeout`, `ToolExecutionFailed`) are recovered inside the tool loop
/// and fed back to the model as data. `Provider` during the main generation
/// call is fatal to the request.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Language model provider error: {0}")]
    Provider(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("No response rule matched the request profile")]
    NoMatchingRule,

    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    #[error("Invalid parameters for tool '{tool}': {reason}")]
    InvalidParameters { tool: String, reason: String },

    #[error("Tool '{tool}' timed out after {timeout_secs}s")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("Tool '{tool}' execution failed: {reason}")]
    ToolExecutionFailed { tool: String, reason: String },

    #[error("Unknown model reference: {0}")]
    UnknownModel(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl DomainError {
    /// Whether this error is recovered inside the tool loop rather than
    /// aborting the request.
    pub fn is_tool_recoverable(&self) -> bool {
        matches!(
            self,
            DomainError::ToolNotFound(_)
                | DomainError::InvalidParameters { .. }
                | DomainError::ToolTimeout { .. }
                | DomainError::ToolExecutionFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_errors_are_recoverable() {
        assert!(DomainError::ToolNotFound("x".into()).is_tool_recoverable());
        assert!(DomainError::InvalidParameters {
            tool: "calc".into(),
            reason: "missing field".into()
        }
        .is_tool_recoverable());
        assert!(!DomainError::Provider("401".into()).is_tool_recoverable());
        assert!(!DomainError::NoMatchingRule.is_tool_recoverable());
    }
}

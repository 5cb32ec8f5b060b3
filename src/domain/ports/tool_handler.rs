//! Port for tool implementations.

use async_trait::async_trait;

/// Port trait for the implementation behind a registered tool.
///
/// Handlers receive already-validated parameters and return an arbitrary
/// JSON value. Any error is wrapped by the executor into the structured
/// `{success:false, error, tool_name}` envelope fed back to the model;
/// handlers never abort a request.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn execute(&self, params: serde_json::Value) -> anyhow::Result<serde_json::Value>;
}

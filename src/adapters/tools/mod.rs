//! Tool registry and builtin tool implementations.

pub mod builtin;
pub mod registry;

use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ToolKind, ToolsSectionConfig};

pub use builtin::{CalculatorTool, CurrentTimeTool, MockTool};
pub use registry::{RegisteredTool, ToolRegistry, ToolRegistryBuilder};

/// Build the tool registry from configuration: selected builtins plus
/// config-declared tools. Part of the one-time startup init.
pub fn registry_from_config(config: &ToolsSectionConfig) -> DomainResult<ToolRegistry> {
    let mut builder = ToolRegistry::builder(config.default_timeout_secs);

    for name in &config.builtins {
        builder = match name.as_str() {
            "calculator" => {
                builder.register(CalculatorTool::definition(), Arc::new(CalculatorTool))?
            }
            "current_time" => {
                builder.register(CurrentTimeTool::definition(), Arc::new(CurrentTimeTool))?
            }
            other => {
                return Err(DomainError::Configuration(format!(
                    "Unknown builtin tool: '{other}'"
                )))
            }
        };
    }

    for tool in &config.definitions {
        match tool.kind {
            ToolKind::Mock => {
                let result = tool
                    .mock_result
                    .clone()
                    .unwrap_or(serde_json::Value::Null);
                builder = builder.register(
                    crate::domain::models::ToolDefinition {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                        kind: ToolKind::Mock,
                        timeout_secs: tool.timeout_secs,
                    },
                    Arc::new(MockTool::new(result)),
                )?;
            }
            ToolKind::Builtin | ToolKind::Internal => {
                return Err(DomainError::Configuration(format!(
                    "Tool '{}': only mock tools can be declared in config; \
                     builtins are selected via tools.builtins",
                    tool.name
                )));
            }
        }
    }

    Ok(builder.build())
}

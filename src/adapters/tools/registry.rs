//! Tool registry: immutable name -> tool lookup built once at startup.
//!
//! Registration validates uniqueness and compiles each parameter schema;
//! both failures are configuration errors, fatal at load time and never at
//! request time. After `build()` the registry is read-only.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use jsonschema::Validator;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ToolDefinition, ToolSpec};
use crate::domain::ports::ToolHandler;

/// A tool with its compiled schema validator and handler.
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    validator: Validator,
    handler: Arc<dyn ToolHandler>,
}

impl RegisteredTool {
    pub fn handler(&self) -> Arc<dyn ToolHandler> {
        Arc::clone(&self.handler)
    }

    /// Validate call arguments against the tool's parameter schema.
    pub fn validate_params(&self, params: &serde_json::Value) -> DomainResult<()> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(params)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::InvalidParameters {
                tool: self.definition.name.clone(),
                reason: errors.join("; "),
            })
        }
    }
}

/// Immutable tool lookup. Name lookup is O(1).
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    default_timeout: Duration,
}

impl ToolRegistry {
    pub fn builder(default_timeout_secs: u64) -> ToolRegistryBuilder {
        ToolRegistryBuilder {
            tools: HashMap::new(),
            default_timeout: Duration::from_secs(default_timeout_secs),
        }
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions in name order, for listing.
    pub fn definitions(&self) -> Vec<&ToolDefinition> {
        let mut definitions: Vec<_> = self.tools.values().map(|t| &t.definition).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Schemas advertised to the model, optionally restricted to a subset.
    pub fn specs(&self, allowed: &[String]) -> Vec<ToolSpec> {
        self.definitions()
            .into_iter()
            .filter(|d| allowed.is_empty() || allowed.iter().any(|a| a == &d.name))
            .map(ToolDefinition::spec)
            .collect()
    }

    /// Effective execution timeout for a tool.
    pub fn timeout_for(&self, tool: &RegisteredTool) -> Duration {
        tool.definition
            .timeout_secs
            .map_or(self.default_timeout, Duration::from_secs)
    }
}

// The compiled validators and handler trait objects carry no useful
// representation; registered names are what matters when inspecting.
impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry")
            .field("tools", &names)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

/// Builder used during the startup init step.
pub struct ToolRegistryBuilder {
    tools: HashMap<String, RegisteredTool>,
    default_timeout: Duration,
}

impl ToolRegistryBuilder {
    /// Register a tool. Duplicate names and malformed schemas are
    /// configuration errors.
    pub fn register(
        mut self,
        definition: ToolDefinition,
        handler: Arc<dyn ToolHandler>,
    ) -> DomainResult<Self> {
        if self.tools.contains_key(&definition.name) {
            return Err(DomainError::Configuration(format!(
                "Duplicate tool name: '{}'",
                definition.name
            )));
        }
        let validator = jsonschema::validator_for(&definition.parameters).map_err(|e| {
            DomainError::Configuration(format!(
                "Invalid parameter schema for tool '{}': {e}",
                definition.name
            ))
        })?;
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool {
                definition,
                validator,
                handler,
            },
        );
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            tools: self.tools,
            default_timeout: self.default_timeout,
        }
    }
}

impl fmt::Debug for ToolRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistryBuilder")
            .field("tools", &names)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ToolKind;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        async fn execute(&self, params: serde_json::Value) -> anyhow::Result<serde_json::Value> {
            Ok(params)
        }
    }

    fn definition(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: "test tool".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "expression": {"type": "string"},
                    "mode": {"type": "string", "enum": ["fast", "slow"]}
                },
                "required": ["expression"]
            }),
            kind: ToolKind::Internal,
            timeout_secs: None,
        }
    }

    fn registry_with(names: &[&str]) -> ToolRegistry {
        let mut builder = ToolRegistry::builder(30);
        for name in names {
            builder = builder
                .register(definition(name), Arc::new(EchoHandler))
                .unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let builder = ToolRegistry::builder(30)
            .register(definition("calc"), Arc::new(EchoHandler))
            .unwrap();
        let err = builder
            .register(definition("calc"), Arc::new(EchoHandler))
            .unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
    }

    #[test]
    fn test_validate_params() {
        let registry = registry_with(&["calc"]);
        let tool = registry.get("calc").unwrap();

        assert!(tool.validate_params(&json!({"expression": "2+2"})).is_ok());

        // Missing required field.
        let err = tool.validate_params(&json!({})).unwrap_err();
        assert!(matches!(err, DomainError::InvalidParameters { .. }));

        // Wrong type.
        let err = tool.validate_params(&json!({"expression": 4})).unwrap_err();
        assert!(matches!(err, DomainError::InvalidParameters { .. }));

        // Enum violation.
        let err = tool
            .validate_params(&json!({"expression": "2+2", "mode": "medium"}))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidParameters { .. }));
    }

    #[test]
    fn test_specs_subset() {
        let registry = registry_with(&["calc", "time"]);
        assert_eq!(registry.specs(&[]).len(), 2);
        let subset = registry.specs(&["time".to_string()]);
        assert_eq!(subset.len(), 1);
        assert_eq!(subset[0].name, "time");
    }

    #[test]
    fn test_timeout_override() {
        let mut def = definition("slowpoke");
        def.timeout_secs = Some(5);
        let registry = ToolRegistry::builder(30)
            .register(def, Arc::new(EchoHandler))
            .unwrap()
            .build();
        let tool = registry.get("slowpoke").unwrap();
        assert_eq!(registry.timeout_for(tool), Duration::from_secs(5));
    }

    #[test]
    fn test_debug_lists_registered_names() {
        let registry = ToolRegistry::builder(30)
            .register(definition("calc"), Arc::new(EchoHandler))
            .unwrap()
            .build();
        assert!(format!("{registry:?}").contains("calc"));
    }
}

//! Model registry: named language-model adapters built once at startup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::adapters::llm::mock::MockLanguageModel;
use crate::adapters::llm::openai_api::{OpenAiCompatClient, OpenAiCompatConfig};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ModelConfig;
use crate::domain::ports::LanguageModel;

/// A resolved model: the adapter plus the wire-level model identifier that
/// goes into each completion request.
#[derive(Clone)]
pub struct ModelHandle {
    pub llm: Arc<dyn LanguageModel>,
    pub model_id: String,
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("llm", &self.llm.name())
            .field("model_id", &self.model_id)
            .finish()
    }
}

/// Immutable name -> model lookup shared by all requests.
pub struct ModelRegistry {
    models: HashMap<String, ModelHandle>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.models.keys().collect();
        names.sort();
        f.debug_struct("ModelRegistry").field("models", &names).finish()
    }
}

impl ModelRegistry {
    /// Build adapters for every configured model. Unknown provider kinds and
    /// missing API key variables are configuration errors.
    pub fn from_config(configs: &[ModelConfig]) -> DomainResult<Self> {
        let mut models = HashMap::new();
        for config in configs {
            if models.contains_key(&config.name) {
                return Err(DomainError::Configuration(format!(
                    "Duplicate model name: '{}'",
                    config.name
                )));
            }
            let llm = build_adapter(config)?;
            info!(name = %config.name, provider = %config.provider, "Registered model");
            models.insert(
                config.name.clone(),
                ModelHandle {
                    llm,
                    model_id: config.model_id.clone(),
                },
            );
        }
        Ok(Self { models })
    }

    /// Build a registry from already-constructed handles. Used for wiring
    /// mock models in tests and for embedding the pipeline in other hosts.
    pub fn from_handles(models: HashMap<String, ModelHandle>) -> Self {
        Self { models }
    }

    pub fn resolve(&self, name: &str) -> DomainResult<ModelHandle> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::UnknownModel(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn build_adapter(config: &ModelConfig) -> DomainResult<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "openai_compat" => {
            let mut adapter_config = OpenAiCompatConfig::default()
                .with_base_url(config.base_url.clone())
                .with_timeout(Duration::from_secs(config.timeout_secs));
            if let Some(var) = &config.api_key_env {
                let key = std::env::var(var).map_err(|_| {
                    DomainError::Configuration(format!(
                        "Model '{}' needs API key from unset variable '{var}'",
                        config.name
                    ))
                })?;
                adapter_config = adapter_config.with_api_key(key);
            }
            Ok(Arc::new(OpenAiCompatClient::new(
                config.name.clone(),
                adapter_config,
            )?))
        }
        "mock" => Ok(Arc::new(MockLanguageModel::failing(
            "Mock provider has no scripted completions",
        ))),
        other => Err(DomainError::Configuration(format!(
            "Unknown provider '{other}' for model '{}'",
            config.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str, provider: &str) -> ModelConfig {
        ModelConfig {
            name: name.into(),
            provider: provider.into(),
            base_url: "http://localhost:8000/v1".into(),
            model_id: "test-model".into(),
            api_key_env: None,
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_resolve_known_and_unknown() {
        let registry =
            ModelRegistry::from_config(&[model("default", "openai_compat")]).unwrap();
        let handle = registry.resolve("default").unwrap();
        assert_eq!(handle.model_id, "test-model");

        let err = registry.resolve("missing").unwrap_err();
        assert!(matches!(err, DomainError::UnknownModel(_)));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = ModelRegistry::from_config(&[
            model("default", "openai_compat"),
            model("default", "mock"),
        ])
        .unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = ModelRegistry::from_config(&[model("default", "grpc")]).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
    }

    #[test]
    fn test_debug_lists_model_names() {
        let registry = ModelRegistry::from_config(&[model("default", "mock")]).unwrap();
        assert!(format!("{registry:?}").contains("default"));
        let handle = registry.resolve("default").unwrap();
        assert!(format!("{handle:?}").contains("test-model"));
    }

    #[test]
    fn test_missing_api_key_env_rejected() {
        let mut config = model("default", "openai_compat");
        config.api_key_env = Some("ARBITER_TEST_ABSENT_KEY".into());
        let err = ModelRegistry::from_config(&[config]).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
    }
}

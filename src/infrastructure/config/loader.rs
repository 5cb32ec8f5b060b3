//! Configuration loading and load-time validation.
//!
//! Sources, later wins: built-in defaults, an optional YAML file, then
//! `ARBITER_`-prefixed environment variables (`__` separates nesting, e.g.
//! `ARBITER_RETRIEVAL__TOP_K=5`).
//!
//! Validation here is what keeps whole error classes out of request time:
//! a profile that reaches the rule matcher can always find a rule, and a
//! matched rule always references a registered model.

use std::collections::HashSet;
use std::path::Path;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

pub const ENV_PREFIX: &str = "ARBITER_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Load configuration, layering an optional YAML file and the environment
/// over defaults, then validate.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(path) = path {
        figment = figment.merge(Yaml::file(path));
    }
    let config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(Box::new)?;
    validate(&config)?;
    Ok(config)
}

/// Structural checks that make request-time failures unreachable.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_thresholds(config)?;
    validate_models(config)?;
    validate_rules(config)?;
    validate_tools(config)?;
    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

fn validate_thresholds(config: &Config) -> Result<(), ConfigError> {
    let retrieval = &config.retrieval;
    if retrieval.match_threshold >= retrieval.partial_threshold {
        return Err(invalid(format!(
            "match_threshold ({}) must be below partial_threshold ({})",
            retrieval.match_threshold, retrieval.partial_threshold
        )));
    }
    for collection in &config.collections {
        let match_threshold = collection
            .match_threshold
            .unwrap_or(retrieval.match_threshold);
        let partial_threshold = collection
            .partial_threshold
            .unwrap_or(retrieval.partial_threshold);
        if match_threshold >= partial_threshold {
            return Err(invalid(format!(
                "Collection '{}/{}': match_threshold ({match_threshold}) must be below \
                 partial_threshold ({partial_threshold})",
                collection.service, collection.collection
            )));
        }
    }
    Ok(())
}

fn validate_models(config: &Config) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for model in &config.models {
        if !names.insert(model.name.as_str()) {
            return Err(invalid(format!("Duplicate model name: '{}'", model.name)));
        }
    }

    let check = |referrer: &str, name: &str| {
        if names.contains(name) {
            Ok(())
        } else {
            Err(invalid(format!(
                "{referrer} references unknown model '{name}'"
            )))
        }
    };

    check("topic resolver", &config.topic.model)?;
    check("intent classifier", &config.intent.model)?;
    for rule in &config.rules {
        check(&format!("rule '{}'", rule.name), &rule.model)?;
        if let Some(reasoning) = &rule.reasoning {
            check(&format!("rule '{}' reasoning", rule.name), &reasoning.model)?;
        }
    }
    Ok(())
}

fn validate_rules(config: &Config) -> Result<(), ConfigError> {
    if config.rules.is_empty() {
        return Err(invalid("At least one response rule is required"));
    }
    let catch_all_positions: Vec<usize> = config
        .rules
        .iter()
        .enumerate()
        .filter(|(_, r)| r.criteria.is_empty())
        .map(|(i, _)| i)
        .collect();
    match catch_all_positions.as_slice() {
        [] => {
            return Err(invalid(
                "The last rule must be a catch-all (empty match criteria)",
            ))
        }
        [index] if *index != config.rules.len() - 1 => {
            return Err(invalid(format!(
                "Catch-all rule '{}' must be last",
                config.rules[*index].name
            )))
        }
        [_] => {}
        many => {
            return Err(invalid(format!(
                "At most one catch-all rule is allowed, found {}",
                many.len()
            )))
        }
    }

    for rule in &config.rules {
        if let Some(pattern) = &rule.criteria.intent_pattern {
            regex::Regex::new(pattern).map_err(|e| {
                invalid(format!(
                    "Rule '{}': invalid intent_pattern '{pattern}': {e}",
                    rule.name
                ))
            })?;
        }
    }
    Ok(())
}

fn validate_tools(config: &Config) -> Result<(), ConfigError> {
    let mut names: HashSet<&str> = config.tools.builtins.iter().map(String::as_str).collect();
    if names.len() != config.tools.builtins.len() {
        return Err(invalid("Duplicate builtin tool name"));
    }
    for definition in &config.tools.definitions {
        if !names.insert(&definition.name) {
            return Err(invalid(format!(
                "Duplicate tool name: '{}'",
                definition.name
            )));
        }
    }
    for rule in &config.rules {
        for allowed in &rule.tools.allowed_tools {
            if !names.contains(allowed.as_str()) {
                return Err(invalid(format!(
                    "Rule '{}' allows unknown tool '{allowed}'",
                    rule.name
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        CollectionConfig, MatchCriteria, ModelConfig, ResponseRule, ToolsConfig,
    };
    use std::io::Write;

    fn model(name: &str) -> ModelConfig {
        ModelConfig {
            name: name.into(),
            provider: "openai_compat".into(),
            base_url: "http://localhost:8000/v1".into(),
            model_id: "m".into(),
            api_key_env: None,
            timeout_secs: 30,
        }
    }

    fn rule(name: &str, criteria: MatchCriteria) -> ResponseRule {
        ResponseRule {
            name: name.into(),
            criteria,
            model: "default".into(),
            prompt: "{{message}}".into(),
            max_tokens: 256,
            reasoning: None,
            tools: ToolsConfig::default(),
        }
    }

    fn valid_config() -> Config {
        Config {
            models: vec![model("default")],
            rules: vec![
                rule(
                    "docs",
                    MatchCriteria {
                        service: Some("docs".into()),
                        ..Default::default()
                    },
                ),
                rule("fallback", MatchCriteria::default()),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_catch_all_rejected() {
        let mut config = valid_config();
        config.rules.pop();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("catch-all"));
    }

    #[test]
    fn test_catch_all_not_last_rejected() {
        let mut config = valid_config();
        config.rules.swap(0, 1);
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("must be last"));
    }

    #[test]
    fn test_two_catch_alls_rejected() {
        let mut config = valid_config();
        config.rules.push(rule("fallback2", MatchCriteria::default()));
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("At most one catch-all"));
    }

    #[test]
    fn test_dangling_model_reference_rejected() {
        let mut config = valid_config();
        config.rules[0].model = "missing".into();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("unknown model 'missing'"));
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = valid_config();
        config.retrieval.match_threshold = 0.6;
        config.retrieval.partial_threshold = 0.5;
        assert!(validate(&config).is_err());

        let mut config = valid_config();
        config.collections.push(CollectionConfig {
            service: "docs".into(),
            collection: "faq".into(),
            description: String::new(),
            match_threshold: Some(0.9),
            partial_threshold: None,
            prompt: None,
            token_limit: None,
        });
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_intent_pattern_rejected() {
        let mut config = valid_config();
        config.rules[0].criteria.intent_pattern = Some("(unclosed".into());
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("intent_pattern"));
    }

    #[test]
    fn test_unknown_allowed_tool_rejected() {
        let mut config = valid_config();
        config.rules[0].tools.allowed_tools = vec!["teleport".into()];
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("teleport"));
    }

    #[test]
    fn test_yaml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
retrieval:
  top_k: 7
models:
  - name: default
    model_id: test-model
rules:
  - name: fallback
    model: default
    prompt: "{{{{message}}}}"
"#
        )
        .unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.retrieval.top_k, 7);
        assert_eq!(config.models[0].model_id, "test-model");
        assert_eq!(config.rules.len(), 1);
    }
}

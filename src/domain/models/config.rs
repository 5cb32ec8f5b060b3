//! Configuration model for the Arbiter pipeline.
//!
//! Loaded once at startup, read-only during request processing. Validation
//! (rule ordering, catch-all placement, duplicate tools, threshold order)
//! happens in the config loader, never per request.

use serde::{Deserialize, Serialize};

use super::rule::ResponseRule;
use super::tool::ToolKind;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Retrieval service and classification thresholds.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Language model providers, keyed by model reference.
    #[serde(default)]
    pub models: Vec<ModelConfig>,

    /// Known collections with descriptions and per-collection overrides.
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,

    /// Topic resolution settings.
    #[serde(default)]
    pub topic: TopicConfig,

    /// Intent classification settings.
    #[serde(default)]
    pub intent: IntentClassifierConfig,

    /// Statically configured intent categories.
    #[serde(default)]
    pub intents: Vec<IntentConfig>,

    /// Ordered response rules; index is priority, catch-all last.
    #[serde(default)]
    pub rules: Vec<ResponseRule>,

    /// Tool registry configuration.
    #[serde(default)]
    pub tools: ToolsSectionConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json or pretty.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// How the retrieval collector iterates the selected collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorMode {
    /// Stop at the first match (default).
    #[default]
    First,
    /// Query every pair, keep every match/partial entry.
    All,
}

/// Retrieval service configuration and default thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetrievalConfig {
    /// Base URL of the vector-store wrapper service.
    #[serde(default = "default_retrieval_url")]
    pub base_url: String,

    /// Documents requested per collection query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// HTTP timeout for retrieval queries.
    #[serde(default = "default_retrieval_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub mode: CollectorMode,

    /// Distances strictly below this classify as match.
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    /// Distances in [match, partial) classify as partial.
    #[serde(default = "default_partial_threshold")]
    pub partial_threshold: f64,
}

fn default_retrieval_url() -> String {
    "http://localhost:5006".to_string()
}

const fn default_top_k() -> usize {
    3
}

const fn default_retrieval_timeout() -> u64 {
    30
}

const fn default_match_threshold() -> f64 {
    0.25
}

const fn default_partial_threshold() -> f64 {
    0.5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            base_url: default_retrieval_url(),
            top_k: default_top_k(),
            timeout_secs: default_retrieval_timeout(),
            mode: CollectorMode::default(),
            match_threshold: default_match_threshold(),
            partial_threshold: default_partial_threshold(),
        }
    }
}

/// A language model provider entry. Rules reference models by `name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ModelConfig {
    /// Reference name used by rules, topic and intent config.
    pub name: String,

    /// Provider kind: openai_compat or mock.
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL of an OpenAI-compatible chat-completions endpoint.
    #[serde(default)]
    pub base_url: String,

    /// Provider-side model identifier sent on the wire.
    pub model_id: String,

    /// Environment variable holding the API key, if the endpoint needs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// HTTP timeout for completion requests.
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "openai_compat".to_string()
}

const fn default_model_timeout() -> u64 {
    120
}

/// A known collection with its description and optional overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CollectionConfig {
    pub service: String,
    pub collection: String,

    /// Description used for synthetic intent categories.
    #[serde(default)]
    pub description: String,

    /// Per-collection threshold overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_threshold: Option<f64>,

    /// Per-collection prompt template override carried onto entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Per-collection max-token override carried onto entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_limit: Option<u32>,
}

/// Topic resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TopicConfig {
    /// Model reference for topic classification.
    #[serde(default = "default_utility_model")]
    pub model: String,

    #[serde(default = "default_topic_max_tokens")]
    pub max_tokens: u32,
}

fn default_utility_model() -> String {
    "default".to_string()
}

const fn default_topic_max_tokens() -> u32 {
    128
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            model: default_utility_model(),
            max_tokens: default_topic_max_tokens(),
        }
    }
}

/// Intent classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IntentClassifierConfig {
    /// Model reference for intent classification.
    #[serde(default = "default_utility_model")]
    pub model: String,

    #[serde(default = "default_intent_max_tokens")]
    pub max_tokens: u32,

    /// Near-zero by default so category selection stays stable.
    #[serde(default = "default_intent_temperature")]
    pub temperature: f32,
}

const fn default_intent_max_tokens() -> u32 {
    64
}

const fn default_intent_temperature() -> f32 {
    0.01
}

impl Default for IntentClassifierConfig {
    fn default() -> Self {
        Self {
            model: default_utility_model(),
            max_tokens: default_intent_max_tokens(),
            temperature: default_intent_temperature(),
        }
    }
}

/// A statically configured intent category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IntentConfig {
    pub name: String,
    pub description: String,
}

/// Tool registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ToolsSectionConfig {
    /// Default per-tool execution timeout.
    #[serde(default = "default_tool_timeout")]
    pub default_timeout_secs: u64,

    /// Which builtin tools to register.
    #[serde(default = "default_builtins")]
    pub builtins: Vec<String>,

    /// Config-declared tools (mock or builtin by name).
    #[serde(default)]
    pub definitions: Vec<ToolConfig>,
}

const fn default_tool_timeout() -> u64 {
    30
}

fn default_builtins() -> Vec<String> {
    vec!["calculator".to_string(), "current_time".to_string()]
}

impl Default for ToolsSectionConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_tool_timeout(),
            builtins: default_builtins(),
            definitions: vec![],
        }
    }
}

/// A config-declared tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ToolConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,

    /// JSON Schema for the parameters object.
    #[serde(default = "empty_object_schema")]
    pub parameters: serde_json::Value,

    #[serde(default = "default_tool_kind")]
    pub kind: ToolKind,

    /// Canned result for mock tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock_result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

const fn default_tool_kind() -> ToolKind {
    ToolKind::Mock
}

impl Config {
    /// Look up a collection's configuration by `(service, collection)`.
    pub fn collection_config(&self, service: &str, collection: &str) -> Option<&CollectionConfig> {
        self.collections
            .iter()
            .find(|c| c.service == service && c.collection == collection)
    }

    /// Effective match threshold for a collection.
    pub fn match_threshold_for(&self, service: &str, collection: &str) -> f64 {
        self.collection_config(service, collection)
            .and_then(|c| c.match_threshold)
            .unwrap_or(self.retrieval.match_threshold)
    }

    /// Effective partial threshold for a collection.
    pub fn partial_threshold_for(&self, service: &str, collection: &str) -> f64 {
        self.collection_config(service, collection)
            .and_then(|c| c.partial_threshold)
            .unwrap_or(self.retrieval.partial_threshold)
    }
}

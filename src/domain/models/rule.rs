//! Response rules: the ordered, config-driven dispatch table.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::profile::{Profile, RagResult};

/// Retrieval-state criterion values accepted in rule criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RagResultCriterion {
    Match,
    Partial,
    None,
    /// Match or partial.
    Any,
}

impl RagResultCriterion {
    fn holds(self, result: RagResult) -> bool {
        match self {
            RagResultCriterion::Match => result == RagResult::Match,
            RagResultCriterion::Partial => result == RagResult::Partial,
            RagResultCriterion::None => result == RagResult::None,
            RagResultCriterion::Any => matches!(result, RagResult::Match | RagResult::Partial),
        }
    }
}

/// Match criteria for a response rule. Every present criterion must hold
/// (logical AND); an empty criteria set matches unconditionally (catch-all).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct MatchCriteria {
    /// Exact service name of the matched retrieval entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Exact collection name of the matched retrieval entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// Substring containment over the matched entry's collection name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_contains: Option<String>,

    /// Exact intent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_exact: Option<String>,

    /// Regex tested against the intent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_pattern: Option<String>,

    /// Retrieval-state criterion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag_result: Option<RagResultCriterion>,

    /// Whether the rule requires (or forbids) a reasoning stage request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_required: Option<bool>,

    /// Compiled form of `intent_pattern`, filled on first evaluation.
    #[serde(skip)]
    pub intent_regex: OnceLock<Option<Regex>>,
}

impl MatchCriteria {
    /// A criteria set with no fields matches any profile.
    pub fn is_empty(&self) -> bool {
        self.service.is_none()
            && self.collection.is_none()
            && self.collection_contains.is_none()
            && self.intent_exact.is_none()
            && self.intent_pattern.is_none()
            && self.rag_result.is_none()
            && self.reasoning_required.is_none()
    }

    /// Evaluate all present criteria against a profile.
    ///
    /// `intent_pattern` must have been validated at load time; an invalid
    /// pattern here simply fails the criterion rather than the request.
    pub fn matches(&self, profile: &Profile, reasoning_requested: bool) -> bool {
        let matched_entry = profile.matched_entry();

        if let Some(ref service) = self.service {
            if matched_entry.map(|e| e.service.as_str()) != Some(service.as_str()) {
                return false;
            }
        }

        if let Some(ref collection) = self.collection {
            if matched_entry.map(|e| e.collection.as_str()) != Some(collection.as_str()) {
                return false;
            }
        }

        if let Some(ref fragment) = self.collection_contains {
            match matched_entry {
                Some(entry) if entry.collection.contains(fragment.as_str()) => {}
                _ => return false,
            }
        }

        if let Some(ref intent) = self.intent_exact {
            if profile.intent.as_deref() != Some(intent.as_str()) {
                return false;
            }
        }

        if let Some(ref pattern) = self.intent_pattern {
            let Some(ref intent) = profile.intent else {
                return false;
            };
            // Compiled once per criteria set, not per evaluation.
            match self.intent_regex.get_or_init(|| Regex::new(pattern).ok()) {
                Some(re) if re.is_match(intent) => {}
                _ => return false,
            }
        }

        if let Some(criterion) = self.rag_result {
            if !criterion.holds(profile.rag_result) {
                return false;
            }
        }

        if let Some(required) = self.reasoning_required {
            if reasoning_requested != required {
                return false;
            }
        }

        true
    }
}

/// Two-stage reasoning configuration: a separate completion whose output is
/// folded into the `{{reasoning}}` template variable before the main call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Model reference for the reasoning completion.
    pub model: String,
    /// Prompt template for the reasoning stage.
    pub prompt: String,
    #[serde(default = "default_reasoning_max_tokens")]
    pub max_tokens: u32,
}

const fn default_reasoning_max_tokens() -> u32 {
    2048
}

/// Tool-loop configuration attached to a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub enabled: bool,
    /// Restrict the advertised tools to this subset. Empty means all.
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

const fn default_max_iterations() -> u32 {
    5
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_tools: Vec::new(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// One entry in the ordered response-rule list. Array index is priority:
/// the first rule whose criteria all hold wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRule {
    /// Human-readable rule name, for logging only.
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub criteria: MatchCriteria,

    /// Model reference resolved through the model registry.
    pub model: String,

    /// Prompt template with `{{message}}`, `{{topic}}`, `{{intent}}`,
    /// `{{context}}`, `{{expanded_context}}` and `{{reasoning}}` variables.
    pub prompt: String,

    #[serde(default = "default_rule_max_tokens")]
    pub max_tokens: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningConfig>,

    #[serde(default)]
    pub tools: ToolsConfig,
}

const fn default_rule_max_tokens() -> u32 {
    1024
}

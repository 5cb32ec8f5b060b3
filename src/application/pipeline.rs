//! The request pipeline: topic -> retrieval -> intent -> profile -> rule ->
//! generation.
//!
//! Each call to [`Pipeline::run`] is an independent, stateless request; the
//! only shared state is the read-only configuration and the registries built
//! at startup.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::llm::registry::ModelRegistry;
use crate::adapters::tools::ToolRegistry;
use crate::application::generator::ResponseGenerator;
use crate::application::intent::IntentClassifier;
use crate::application::retrieval::RetrievalCollector;
use crate::application::rules::match_rule;
use crate::application::topic::TopicResolver;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CollectionRef, Config, Profile, RagResult, ToolCallRecord, TopicStatus,
};
use crate::domain::ports::RetrievalClient;

/// Surfaced when no rule matched, which a validated config makes unreachable.
pub const NO_RULE_MESSAGE: &str =
    "I'm sorry, I don't know how to answer that right now. Please try again later.";

/// Surfaced when the main generation call fails. Distinct from the tool
/// loop's exhaustion message.
pub const GENERATION_FAILURE_MESSAGE: &str =
    "I'm sorry, something went wrong while generating a response. Please try again.";

/// One turn's input.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub user_message: String,
    /// Empty means the conversation has no running topic yet.
    pub prior_topic: String,
    /// Collections to consult; empty falls back to every configured one.
    pub selected_collections: Vec<CollectionRef>,
    pub reasoning_requested: bool,
}

/// One turn's output.
#[derive(Debug, Clone)]
pub struct TurnResponse {
    pub content: String,
    pub topic: String,
    pub topic_status: TopicStatus,
    pub rag_result: RagResult,
    pub matched_rule_index: Option<usize>,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Stateless request processor over startup-built registries.
pub struct Pipeline {
    config: Arc<Config>,
    models: ModelRegistry,
    retrieval: Arc<dyn RetrievalClient>,
    tools: ToolRegistry,
}

impl Pipeline {
    pub fn new(
        config: Arc<Config>,
        models: ModelRegistry,
        retrieval: Arc<dyn RetrievalClient>,
        tools: ToolRegistry,
    ) -> Self {
        Self {
            config,
            models,
            retrieval,
            tools,
        }
    }

    /// Process one turn.
    ///
    /// Rule-miss and main-generation failures come back as user-facing
    /// content, not errors; `Err` is reserved for defects a valid
    /// configuration rules out, like dangling model references.
    #[instrument(
        skip(self, request),
        fields(request_id = %Uuid::new_v4(), message_len = request.user_message.len())
    )]
    pub async fn run(&self, request: TurnRequest) -> DomainResult<TurnResponse> {
        let topic_handle = self.models.resolve(&self.config.topic.model)?;
        let resolver = TopicResolver::new(
            topic_handle.llm,
            self.config.topic.clone(),
            topic_handle.model_id,
        );
        let resolution = resolver
            .resolve(&request.user_message, &request.prior_topic)
            .await;
        info!(topic = %resolution.topic, status = ?resolution.status, "Topic resolved");

        let pairs = if request.selected_collections.is_empty() {
            self.config
                .collections
                .iter()
                .map(|c| CollectionRef {
                    service: c.service.clone(),
                    collection: c.collection.clone(),
                })
                .collect()
        } else {
            request.selected_collections.clone()
        };

        let collector = RetrievalCollector::new(Arc::clone(&self.retrieval), Arc::clone(&self.config));
        let outcome = collector.collect(&pairs, &resolution.topic).await;
        info!(
            rag_result = ?outcome.rag_result,
            entries = outcome.entries.len(),
            "Retrieval collected"
        );

        let mut profile = Profile {
            user_message: request.user_message.clone(),
            topic: resolution.topic,
            topic_status: resolution.status,
            rag_result: outcome.rag_result,
            rag_entries: outcome.entries,
            intent: None,
            selected_collections: pairs,
        };

        if profile.rag_result != RagResult::Match {
            let intent_handle = self.models.resolve(&self.config.intent.model)?;
            let classifier = IntentClassifier::new(
                intent_handle.llm,
                self.config.intent.clone(),
                intent_handle.model_id,
                self.config.intents.clone(),
            );
            let partials: Vec<_> = profile.partial_entries().collect();
            let intent = classifier.classify(&profile.user_message, &partials).await;
            profile.intent = intent;
            info!(intent = ?profile.intent, "Intent classified");
        }

        let (rule_index, rule) = match match_rule(
            &self.config.rules,
            &profile,
            request.reasoning_requested,
        ) {
            Ok(found) => found,
            Err(DomainError::NoMatchingRule) => {
                error!("No rule matched; configuration is missing a catch-all");
                return Ok(TurnResponse {
                    content: NO_RULE_MESSAGE.to_string(),
                    topic: profile.topic,
                    topic_status: profile.topic_status,
                    rag_result: profile.rag_result,
                    matched_rule_index: None,
                    tool_calls: Vec::new(),
                });
            }
            Err(other) => return Err(other),
        };
        info!(rule = %rule.name, index = rule_index, "Rule matched");

        let main_handle = self.models.resolve(&rule.model)?;
        let reasoning_handle = match &rule.reasoning {
            Some(reasoning) => {
                let handle = self.models.resolve(&reasoning.model)?;
                Some((handle.llm, handle.model_id))
            }
            None => None,
        };
        let generator = ResponseGenerator::new(
            main_handle.llm,
            main_handle.model_id,
            reasoning_handle,
            &self.tools,
        );

        match generator.generate(rule, &profile).await {
            Ok(generated) => Ok(TurnResponse {
                content: generated.content,
                topic: profile.topic,
                topic_status: profile.topic_status,
                rag_result: profile.rag_result,
                matched_rule_index: Some(rule_index),
                tool_calls: generated.tool_calls,
            }),
            Err(DomainError::Provider(reason)) => {
                warn!(%reason, "Main generation failed");
                Ok(TurnResponse {
                    content: GENERATION_FAILURE_MESSAGE.to_string(),
                    topic: profile.topic,
                    topic_status: profile.topic_status,
                    rag_result: profile.rag_result,
                    matched_rule_index: Some(rule_index),
                    tool_calls: Vec::new(),
                })
            }
            Err(other) => Err(other),
        }
    }
}

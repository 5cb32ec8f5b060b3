//! Response generation: template rendering, optional reasoning pre-pass,
//! and the tool loop when the matched rule enables it.

use std::sync::Arc;

use tracing::debug;

use crate::adapters::tools::ToolRegistry;
use crate::application::tool_loop::{ToolLoop, ToolLoopOutcome};
use crate::domain::errors::DomainResult;
use crate::domain::models::{
    ChatMessage, CompletionRequest, Profile, ResponseRule, RetrievalEntry, ToolCallRecord,
};
use crate::domain::ports::LanguageModel;

/// A generated response plus the tool history that produced it.
#[derive(Debug, Clone, Default)]
pub struct GeneratedResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub exhausted: bool,
}

/// Renders the matched rule's prompt against a profile and drives the main
/// completion. Models are resolved by the caller so the generator stays
/// transport-agnostic.
pub struct ResponseGenerator<'a> {
    main_llm: Arc<dyn LanguageModel>,
    main_model_id: String,
    reasoning_llm: Option<(Arc<dyn LanguageModel>, String)>,
    tool_registry: &'a ToolRegistry,
}

impl<'a> ResponseGenerator<'a> {
    pub fn new(
        main_llm: Arc<dyn LanguageModel>,
        main_model_id: String,
        reasoning_llm: Option<(Arc<dyn LanguageModel>, String)>,
        tool_registry: &'a ToolRegistry,
    ) -> Self {
        Self {
            main_llm,
            main_model_id,
            reasoning_llm,
            tool_registry,
        }
    }

    pub async fn generate(
        &self,
        rule: &ResponseRule,
        profile: &Profile,
    ) -> DomainResult<GeneratedResponse> {
        let reasoning = match (&rule.reasoning, &self.reasoning_llm) {
            (Some(config), Some((llm, model_id))) => {
                let prompt = render_template(&config.prompt, profile, "");
                debug!(model = %model_id, "Running reasoning pre-pass");
                let request = CompletionRequest::new(
                    model_id.clone(),
                    vec![ChatMessage::user(prompt)],
                    config.max_tokens,
                );
                Some(llm.complete(request).await?.content)
            }
            _ => None,
        };

        let template = profile
            .matched_entry()
            .and_then(|e| e.prompt_override.as_deref())
            .unwrap_or(&rule.prompt);
        let prompt = render_template(template, profile, reasoning.as_deref().unwrap_or(""));
        let messages = vec![
            ChatMessage::system(prompt),
            ChatMessage::user(profile.user_message.clone()),
        ];

        if rule.tools.enabled && !self.tool_registry.is_empty() {
            let tool_loop = ToolLoop::new(
                Arc::clone(&self.main_llm),
                self.tool_registry,
                &rule.tools,
                self.main_model_id.clone(),
                rule.max_tokens,
            );
            let ToolLoopOutcome {
                content,
                records,
                exhausted,
            } = tool_loop.run(messages).await?;
            return Ok(GeneratedResponse {
                content,
                tool_calls: records,
                exhausted,
            });
        }

        let request =
            CompletionRequest::new(self.main_model_id.clone(), messages, rule.max_tokens);
        let completion = self.main_llm.complete(request).await?;
        Ok(GeneratedResponse {
            content: completion.content,
            tool_calls: Vec::new(),
            exhausted: false,
        })
    }
}

/// Substitute profile variables into a prompt template.
pub fn render_template(template: &str, profile: &Profile, reasoning: &str) -> String {
    let context = profile
        .matched_entry()
        .map(format_entry_context)
        .unwrap_or_default();
    let expanded: String = profile
        .partial_entries()
        .map(format_entry_context)
        .collect::<Vec<_>>()
        .join("\n\n");

    template
        .replace("{{message}}", &profile.user_message)
        .replace("{{topic}}", &profile.topic)
        .replace("{{intent}}", profile.intent.as_deref().unwrap_or(""))
        .replace("{{context}}", &context)
        .replace("{{expanded_context}}", &expanded)
        .replace("{{reasoning}}", reasoning)
}

/// Format one entry's documents, honoring its token limit override.
fn format_entry_context(entry: &RetrievalEntry) -> String {
    let joined = entry.joined_documents();
    match entry.token_limit_override {
        Some(limit) => truncate_to_tokens(&joined, limit),
        None => joined,
    }
}

/// Approximate token truncation: whitespace-separated words.
fn truncate_to_tokens(text: &str, limit: u32) -> String {
    let mut words = text.split_whitespace();
    let taken: Vec<&str> = words.by_ref().take(limit as usize).collect();
    if words.next().is_some() {
        taken.join(" ")
    } else {
        text.to_string()
    }
}

//! The bounded tool-calling loop.
//!
//! Modeled as an explicit finite-state machine with a bounded iteration
//! counter rather than recursion, so the termination guarantee (at most
//! `max_iterations + 1` model calls) is inspectable and testable.
//!
//! Tool-call failures are never fatal: lookup misses, invalid parameters,
//! handler errors, and timeouts are all folded into the structured
//! `{success, error, tool_name}` envelope and fed back to the model as the
//! tool's result, letting it self-correct or explain the failure.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::adapters::tools::ToolRegistry;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ChatMessage, Completion, CompletionRequest, FinishReason, ToolCallRecord, ToolCallRequest,
    ToolOutcome, ToolsConfig,
};
use crate::domain::ports::LanguageModel;

/// Fallback returned when the loop hits its iteration bound.
pub const MAX_ITERATIONS_MESSAGE: &str =
    "I'm sorry, I couldn't complete this request within the allowed number of \
     tool steps. Here is what I attempted so far; please rephrase or simplify \
     the request.";

/// Loop states. `Generating` awaits the model; `Executing` runs a batch of
/// requested tool calls; `Done` and `Exhausted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopPhase {
    Generating,
    Executing,
    Done,
    Exhausted,
}

/// Final outcome of a tool loop run.
#[derive(Debug, Clone)]
pub struct ToolLoopOutcome {
    pub content: String,
    /// Full call history, also returned on exhaustion (never dropped).
    pub records: Vec<ToolCallRecord>,
    pub exhausted: bool,
}

/// Drives the Generating/Executing cycle for one request.
pub struct ToolLoop<'a> {
    llm: Arc<dyn LanguageModel>,
    registry: &'a ToolRegistry,
    config: &'a ToolsConfig,
    model_id: String,
    max_tokens: u32,
}

impl<'a> ToolLoop<'a> {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        registry: &'a ToolRegistry,
        config: &'a ToolsConfig,
        model_id: String,
        max_tokens: u32,
    ) -> Self {
        Self {
            llm,
            registry,
            config,
            model_id,
            max_tokens,
        }
    }

    /// Run the loop starting from the rendered prompt messages.
    ///
    /// Errors from the model itself (`Provider`) abort the loop; tool-level
    /// failures do not.
    pub async fn run(&self, mut messages: Vec<ChatMessage>) -> DomainResult<ToolLoopOutcome> {
        let tool_specs = self.registry.specs(&self.config.allowed_tools);
        let mut records: Vec<ToolCallRecord> = Vec::new();
        let mut iteration: u32 = 0;
        let mut phase = LoopPhase::Generating;
        let mut final_content = String::new();
        let mut pending_calls: Vec<ToolCallRequest> = Vec::new();

        loop {
            match phase {
                LoopPhase::Generating => {
                    let request = CompletionRequest::new(
                        self.model_id.clone(),
                        messages.clone(),
                        self.max_tokens,
                    )
                    .with_tools(tool_specs.clone());

                    let completion = self.llm.complete(request).await?;
                    phase = match completion.finish_reason {
                        FinishReason::ToolCalls if !completion.tool_calls.is_empty() => {
                            if iteration >= self.config.max_iterations {
                                LoopPhase::Exhausted
                            } else {
                                messages.push(ChatMessage::assistant_tool_calls(
                                    completion.content.clone(),
                                    completion.tool_calls.clone(),
                                ));
                                pending_calls = completion.tool_calls;
                                LoopPhase::Executing
                            }
                        }
                        _ => {
                            final_content = extract_content(completion);
                            LoopPhase::Done
                        }
                    };
                }
                LoopPhase::Executing => {
                    // Sequential, in model order: later calls may depend on
                    // the effects of earlier ones, and the result messages
                    // must line up with the request order in the history.
                    for call in pending_calls.drain(..) {
                        let started = Instant::now();
                        let outcome = self.execute_call(&call).await;
                        #[allow(clippy::cast_possible_truncation)]
                        let elapsed_ms = started.elapsed().as_millis() as u64;
                        messages.push(ChatMessage::tool_result(
                            call.id.clone(),
                            outcome.to_message_content(),
                        ));
                        records.push(ToolCallRecord {
                            tool_name: call.name,
                            params: call.arguments,
                            outcome,
                            iteration,
                            elapsed_ms,
                        });
                    }
                    iteration += 1;
                    phase = LoopPhase::Generating;
                }
                LoopPhase::Done => {
                    debug!(
                        iterations = iteration,
                        tool_calls = records.len(),
                        "Tool loop completed"
                    );
                    return Ok(ToolLoopOutcome {
                        content: final_content,
                        records,
                        exhausted: false,
                    });
                }
                LoopPhase::Exhausted => {
                    warn!(
                        max_iterations = self.config.max_iterations,
                        tool_calls = records.len(),
                        "Tool loop exhausted its iteration budget"
                    );
                    return Ok(ToolLoopOutcome {
                        content: MAX_ITERATIONS_MESSAGE.to_string(),
                        records,
                        exhausted: true,
                    });
                }
            }
        }
    }

    /// Execute one requested call: lookup, validate, run under timeout.
    /// Every failure becomes a structured envelope, not an error.
    async fn execute_call(&self, call: &ToolCallRequest) -> ToolOutcome {
        let allowed = &self.config.allowed_tools;
        if !allowed.is_empty() && !allowed.iter().any(|a| a == &call.name) {
            return ToolOutcome::failure(
                &call.name,
                format!("Tool '{}' not found", call.name),
            );
        }

        let Some(tool) = self.registry.get(&call.name) else {
            return ToolOutcome::failure(
                &call.name,
                format!("Tool '{}' not found", call.name),
            );
        };

        if let Err(err) = tool.validate_params(&call.arguments) {
            return ToolOutcome::failure(&call.name, err.to_string());
        }

        let timeout = self.registry.timeout_for(tool);
        let handler = tool.handler();
        match tokio::time::timeout(timeout, handler.execute(call.arguments.clone())).await {
            Ok(Ok(result)) => ToolOutcome::success(&call.name, result),
            Ok(Err(err)) => ToolOutcome::failure(
                &call.name,
                DomainError::ToolExecutionFailed {
                    tool: call.name.clone(),
                    reason: err.to_string(),
                }
                .to_string(),
            ),
            Err(_) => ToolOutcome::failure(
                &call.name,
                DomainError::ToolTimeout {
                    tool: call.name.clone(),
                    timeout_secs: timeout.as_secs(),
                }
                .to_string(),
            ),
        }
    }
}

fn extract_content(completion: Completion) -> String {
    if completion.finish_reason == FinishReason::Length {
        debug!("Completion truncated at token limit");
    }
    completion.content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::llm::mock::MockLanguageModel;
    use crate::adapters::tools::{registry_from_config, ToolRegistry};
    use crate::domain::models::{ToolDefinition, ToolKind, ToolsSectionConfig};
    use crate::domain::ports::ToolHandler;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    fn registry() -> ToolRegistry {
        registry_from_config(&ToolsSectionConfig::default()).unwrap()
    }

    fn tools_config(max_iterations: u32) -> ToolsConfig {
        ToolsConfig {
            enabled: true,
            allowed_tools: vec![],
            max_iterations,
        }
    }

    fn call(name: &str, args: serde_json::Value) -> ToolCallRequest {
        ToolCallRequest {
            id: "call_1".into(),
            name: name.into(),
            arguments: args,
        }
    }

    #[tokio::test]
    async fn test_calculator_happy_path() {
        let llm = Arc::new(MockLanguageModel::scripted(vec![
            Completion::tool_calls(vec![call("calculator", json!({"expression": "2+2"}))]),
            Completion::text("The answer is 4."),
        ]));
        let registry = registry();
        let config = tools_config(5);
        let tool_loop = ToolLoop::new(llm.clone(), &registry, &config, "m".into(), 512);

        let outcome = tool_loop.run(vec![ChatMessage::user("what is 2+2")]).await.unwrap();
        assert_eq!(outcome.content, "The answer is 4.");
        assert!(!outcome.exhausted);
        assert_eq!(outcome.records.len(), 1);
        assert!(outcome.records[0].outcome.success);
        assert_eq!(outcome.records[0].outcome.result, Some(json!(4)));
        assert_eq!(llm.call_count(), 2);

        // The second request carries assistant tool-call and tool result
        // messages in order.
        let second = &llm.requests()[1];
        let roles: Vec<_> = second.messages.iter().map(|m| m.role).collect();
        use crate::domain::models::Role;
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool]);
    }

    #[tokio::test]
    async fn test_unknown_tool_fed_back_until_exhaustion() {
        // Model keeps requesting a tool that does not exist.
        let endless: Vec<Completion> = (0..10)
            .map(|_| Completion::tool_calls(vec![call("teleport", json!({}))]))
            .collect();
        let llm = Arc::new(MockLanguageModel::scripted(endless));
        let registry = registry();
        let config = tools_config(3);
        let tool_loop = ToolLoop::new(llm.clone(), &registry, &config, "m".into(), 512);

        let outcome = tool_loop.run(vec![ChatMessage::user("go")]).await.unwrap();
        assert!(outcome.exhausted);
        assert_eq!(outcome.content, MAX_ITERATIONS_MESSAGE);
        // Terminates within max_iterations + 1 model calls.
        assert_eq!(llm.call_count(), 4);
        // History never dropped: one record per executed batch.
        assert_eq!(outcome.records.len(), 3);
        assert!(outcome.records.iter().all(|r| !r.outcome.success));
        assert!(outcome.records[0]
            .outcome
            .error
            .as_deref()
            .unwrap()
            .contains("not found"));
    }

    #[tokio::test]
    async fn test_invalid_params_are_not_fatal() {
        let llm = Arc::new(MockLanguageModel::scripted(vec![
            Completion::tool_calls(vec![call("calculator", json!({"wrong": 1}))]),
            Completion::text("Sorry, I could not compute that."),
        ]));
        let registry = registry();
        let config = tools_config(5);
        let tool_loop = ToolLoop::new(llm, &registry, &config, "m".into(), 512);

        let outcome = tool_loop.run(vec![ChatMessage::user("calc")]).await.unwrap();
        assert!(!outcome.exhausted);
        assert_eq!(outcome.records.len(), 1);
        let error = outcome.records[0].outcome.error.as_deref().unwrap();
        assert!(error.contains("Invalid parameters"));
    }

    #[tokio::test]
    async fn test_execution_error_envelope() {
        let llm = Arc::new(MockLanguageModel::scripted(vec![
            Completion::tool_calls(vec![call("calculator", json!({"expression": "1/0"}))]),
            Completion::text("Division by zero is undefined."),
        ]));
        let registry = registry();
        let config = tools_config(5);
        let tool_loop = ToolLoop::new(llm, &registry, &config, "m".into(), 512);

        let outcome = tool_loop.run(vec![ChatMessage::user("calc")]).await.unwrap();
        assert_eq!(outcome.content, "Division by zero is undefined.");
        let record = &outcome.records[0];
        assert!(!record.outcome.success);
        assert!(record.outcome.error.as_deref().unwrap().contains("division by zero"));
    }

    struct StallingHandler;

    #[async_trait]
    impl ToolHandler for StallingHandler {
        async fn execute(&self, _params: serde_json::Value) -> anyhow::Result<serde_json::Value> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(json!(null))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_envelope_continues_to_stop() {
        let llm = Arc::new(MockLanguageModel::scripted(vec![
            Completion::tool_calls(vec![call("stall", json!({}))]),
            Completion::text("That lookup timed out."),
        ]));
        let registry = ToolRegistry::builder(30)
            .register(
                ToolDefinition {
                    name: "stall".into(),
                    description: "never returns".into(),
                    parameters: json!({"type": "object"}),
                    kind: ToolKind::Internal,
                    timeout_secs: Some(1),
                },
                Arc::new(StallingHandler),
            )
            .unwrap()
            .build();
        let config = tools_config(5);
        let tool_loop = ToolLoop::new(llm.clone(), &registry, &config, "m".into(), 512);

        let outcome = tool_loop.run(vec![ChatMessage::user("stall")]).await.unwrap();
        // The timeout is folded into the failure envelope and the loop
        // finishes on the next completion.
        assert_eq!(outcome.content, "That lookup timed out.");
        assert!(!outcome.exhausted);
        assert!(!outcome.records[0].outcome.success);
        let error = outcome.records[0].outcome.error.as_deref().unwrap();
        assert!(error.contains("timed out after 1s"));
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_allowed_tools_subset() {
        // calculator exists but is outside the rule's allowed subset.
        let llm = Arc::new(MockLanguageModel::scripted(vec![
            Completion::tool_calls(vec![call("calculator", json!({"expression": "2+2"}))]),
            Completion::text("done"),
        ]));
        let registry = registry();
        let config = ToolsConfig {
            enabled: true,
            allowed_tools: vec!["current_time".into()],
            max_iterations: 5,
        };
        let tool_loop = ToolLoop::new(llm.clone(), &registry, &config, "m".into(), 512);

        let outcome = tool_loop.run(vec![ChatMessage::user("calc")]).await.unwrap();
        assert!(!outcome.records[0].outcome.success);
        // Only the allowed subset is advertised to the model.
        assert_eq!(llm.requests()[0].tools.len(), 1);
        assert_eq!(llm.requests()[0].tools[0].name, "current_time");
    }

    #[tokio::test]
    async fn test_no_tool_calls_returns_immediately() {
        let llm = Arc::new(MockLanguageModel::scripted(vec![Completion::text("hi")]));
        let registry = registry();
        let config = tools_config(5);
        let tool_loop = ToolLoop::new(llm.clone(), &registry, &config, "m".into(), 512);

        let outcome = tool_loop.run(vec![ChatMessage::user("hello")]).await.unwrap();
        assert_eq!(outcome.content, "hi");
        assert!(outcome.records.is_empty());
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_provider_error_aborts_loop() {
        let llm = MockLanguageModel::scripted(vec![Completion::tool_calls(vec![call(
            "calculator",
            json!({"expression": "2+2"}),
        )])]);
        llm.push_error("rate limited");
        let llm = Arc::new(llm);
        let registry = registry();
        let config = tools_config(5);
        let tool_loop = ToolLoop::new(llm, &registry, &config, "m".into(), 512);

        let err = tool_loop.run(vec![ChatMessage::user("calc")]).await.unwrap_err();
        assert!(matches!(err, DomainError::Provider(_)));
    }
}

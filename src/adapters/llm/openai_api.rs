//! OpenAI-compatible chat completions adapter.
//!
//! Speaks the `/chat/completions` wire format, which local inference servers
//! (vLLM, llama.cpp, Ollama) also expose. Timeouts are handled here; there is
//! no retry at this layer.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ChatMessage, Completion, CompletionRequest, FinishReason, Role, ToolCallRequest,
};
use crate::domain::ports::LanguageModel;

#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1".to_string(),
            api_key: None,
            timeout: Duration::from_secs(120),
        }
    }
}

impl OpenAiCompatConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct OpenAiCompatClient {
    name: String,
    config: OpenAiCompatConfig,
    http: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(name: impl Into<String>, config: OpenAiCompatConfig) -> DomainResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DomainError::Provider(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            name: name.into(),
            config,
            http,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> DomainResult<Completion> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = WireRequest::from(&request);
        debug!(model = %request.model, messages = request.messages.len(), "Sending completion request");

        let mut http_request = self.http.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| DomainError::Provider(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DomainError::Provider(format!(
                "Completion request failed with status {status}: {detail}"
            )));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| DomainError::Provider(format!("Malformed completion response: {e}")))?;
        wire.into_completion()
    }
}

#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

impl From<&CompletionRequest> for WireRequest {
    fn from(request: &CompletionRequest) -> Self {
        Self {
            model: request.model.clone(),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools: request
                .tools
                .iter()
                .map(|t| WireTool {
                    kind: "function",
                    function: WireFunctionDef {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.parameters.clone(),
                    },
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct WireMessage {
    role: Role,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        let tool_calls = if message.tool_calls.is_empty() {
            None
        } else {
            Some(
                message
                    .tool_calls
                    .iter()
                    .map(|c| WireToolCall {
                        id: c.id.clone(),
                        kind: "function".to_string(),
                        function: WireFunctionCall {
                            name: c.name.clone(),
                            arguments: c.arguments.to_string(),
                        },
                    })
                    .collect(),
            )
        };
        Self {
            role: message.role,
            content: message.content.clone(),
            tool_calls,
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionDef,
}

#[derive(Serialize)]
struct WireFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded string per the wire format.
    arguments: String,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

impl WireResponse {
    fn into_completion(mut self) -> DomainResult<Completion> {
        if self.choices.is_empty() {
            return Err(DomainError::Provider(
                "Completion response contained no choices".to_string(),
            ));
        }
        let choice = self.choices.remove(0);

        let tool_calls: Vec<ToolCallRequest> = choice
            .message
            .tool_calls
            .into_iter()
            .map(|c| {
                let arguments = serde_json::from_str(&c.function.arguments).map_err(|e| {
                    DomainError::Provider(format!(
                        "Tool call '{}' carried malformed arguments: {e}",
                        c.function.name
                    ))
                })?;
                Ok(ToolCallRequest {
                    id: c.id,
                    name: c.function.name,
                    arguments,
                })
            })
            .collect::<DomainResult<_>>()?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("length") => FinishReason::Length,
            _ if !tool_calls.is_empty() => FinishReason::ToolCalls,
            _ => FinishReason::Stop,
        };

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            finish_reason,
            tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(base_url: &str) -> OpenAiCompatClient {
        OpenAiCompatClient::new(
            "test",
            OpenAiCompatConfig::default()
                .with_base_url(base_url)
                .with_api_key("sk-test")
                .with_timeout(Duration::from_secs(5)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_plain_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "test-model",
                "max_tokens": 256
            })))
            .with_status(200)
            .with_body(
                json!({
                    "choices": [{
                        "message": {"content": "Hello there."},
                        "finish_reason": "stop"
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let request = CompletionRequest::new(
            "test-model",
            vec![ChatMessage::user("hi")],
            256,
        );
        let completion = client(&server.url()).complete(request).await.unwrap();
        assert_eq!(completion.content, "Hello there.");
        assert_eq!(completion.finish_reason, FinishReason::Stop);
        assert!(completion.tool_calls.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_tool_call_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(
                json!({
                    "choices": [{
                        "message": {
                            "content": null,
                            "tool_calls": [{
                                "id": "call_abc",
                                "type": "function",
                                "function": {
                                    "name": "calculator",
                                    "arguments": "{\"expression\": \"2+2\"}"
                                }
                            }]
                        },
                        "finish_reason": "tool_calls"
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let request = CompletionRequest::new("m", vec![ChatMessage::user("calc")], 256);
        let completion = client(&server.url()).complete(request).await.unwrap();
        assert_eq!(completion.finish_reason, FinishReason::ToolCalls);
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].name, "calculator");
        assert_eq!(
            completion.tool_calls[0].arguments,
            json!({"expression": "2+2"})
        );
    }

    #[tokio::test]
    async fn test_error_status_is_provider_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let request = CompletionRequest::new("m", vec![ChatMessage::user("hi")], 256);
        let err = client(&server.url()).complete(request).await.unwrap_err();
        assert!(matches!(err, DomainError::Provider(_)));
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn test_malformed_tool_arguments_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(
                json!({
                    "choices": [{
                        "message": {
                            "content": null,
                            "tool_calls": [{
                                "id": "call_abc",
                                "type": "function",
                                "function": {"name": "calculator", "arguments": "{not json"}
                            }]
                        },
                        "finish_reason": "tool_calls"
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let request = CompletionRequest::new("m", vec![ChatMessage::user("hi")], 256);
        let err = client(&server.url()).complete(request).await.unwrap_err();
        assert!(err.to_string().contains("malformed arguments"));
    }
}

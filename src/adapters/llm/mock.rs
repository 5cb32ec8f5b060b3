//! Mock language model for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Completion, CompletionRequest};
use crate::domain::ports::LanguageModel;

/// Scripted mock: returns queued completions in order, then fails.
/// Records every request it receives for assertions.
pub struct MockLanguageModel {
    script: Mutex<VecDeque<DomainResult<Completion>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    /// Error used when the script runs dry.
    exhausted_error: String,
}

impl MockLanguageModel {
    /// Mock that plays back the given completions in order.
    pub fn scripted(completions: Vec<Completion>) -> Self {
        Self {
            script: Mutex::new(completions.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
            exhausted_error: "mock script exhausted".to_string(),
        }
    }

    /// Mock whose every call fails with a provider error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            exhausted_error: message.into(),
        }
    }

    /// Queue an explicit error between scripted completions.
    pub fn push_error(&self, message: impl Into<String>) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(Err(DomainError::Provider(message.into())));
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> DomainResult<Completion> {
        self.requests.lock().expect("requests lock").push(request);
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| Err(DomainError::Provider(self.exhausted_error.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ChatMessage;

    #[tokio::test]
    async fn test_scripted_playback_and_recording() {
        let mock = MockLanguageModel::scripted(vec![
            Completion::text("first"),
            Completion::text("second"),
        ]);

        let request = CompletionRequest::new("m", vec![ChatMessage::user("hi")], 100);
        assert_eq!(mock.complete(request.clone()).await.unwrap().content, "first");
        assert_eq!(mock.complete(request.clone()).await.unwrap().content, "second");
        assert!(mock.complete(request).await.is_err());
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let mock = MockLanguageModel::failing("down");
        let request = CompletionRequest::new("m", vec![ChatMessage::user("hi")], 100);
        let err = mock.complete(request).await.unwrap_err();
        assert!(matches!(err, DomainError::Provider(_)));
    }
}

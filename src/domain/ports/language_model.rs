//! Port for language model completion providers.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Completion, CompletionRequest};

/// Port trait for chat-completion providers.
///
/// Adapters own transport concerns (HTTP, auth, timeouts, retries). The
/// pipeline only sees a message list going in and a completion with a finish
/// reason and optional tool-call requests coming out. Transport or auth
/// failure surfaces as `DomainError::Provider`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Adapter name, for logging.
    fn name(&self) -> &str;

    /// Send a completion request and wait for the full response.
    async fn complete(&self, request: CompletionRequest) -> DomainResult<Completion>;
}

//! Mock retrieval client for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{
    CollectionInfo, RetrievalClient, RetrievalResponse, ScoredDocument,
};

/// Per-collection canned responses or failures. Records queried collection
/// names for assertions.
pub struct MockRetrievalClient {
    responses: HashMap<String, RetrievalResponse>,
    failures: HashMap<String, String>,
    queries: Mutex<Vec<(String, String)>>,
}

impl MockRetrievalClient {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            failures: HashMap::new(),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Canned single-document response with the given best distance.
    pub fn with_documents(mut self, collection: &str, text: &str, distance: f64) -> Self {
        self.responses.insert(
            collection.to_string(),
            RetrievalResponse {
                results: vec![ScoredDocument {
                    text: text.to_string(),
                    metadata: serde_json::json!({}),
                    distance,
                }],
                collection_metadata: serde_json::json!({}),
            },
        );
        self
    }

    /// Full canned response, for multi-document or metadata cases.
    pub fn with_response(mut self, collection: &str, response: RetrievalResponse) -> Self {
        self.responses.insert(collection.to_string(), response);
        self
    }

    /// Make queries for this collection fail.
    pub fn with_failure(mut self, collection: &str, error: &str) -> Self {
        self.failures
            .insert(collection.to_string(), error.to_string());
        self
    }

    /// Collections queried so far, in order.
    pub fn queried(&self) -> Vec<String> {
        self.queries
            .lock()
            .expect("queries lock")
            .iter()
            .map(|(collection, _)| collection.clone())
            .collect()
    }

    /// Query texts received so far, in order.
    pub fn query_texts(&self) -> Vec<String> {
        self.queries
            .lock()
            .expect("queries lock")
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

impl Default for MockRetrievalClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RetrievalClient for MockRetrievalClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn query(
        &self,
        collection: &str,
        text: &str,
        _top_k: usize,
    ) -> DomainResult<RetrievalResponse> {
        self.queries
            .lock()
            .expect("queries lock")
            .push((collection.to_string(), text.to_string()));
        if let Some(error) = self.failures.get(collection) {
            return Err(DomainError::Retrieval(error.clone()));
        }
        Ok(self
            .responses
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_collections(&self) -> DomainResult<Vec<CollectionInfo>> {
        Ok(self
            .responses
            .keys()
            .map(|name| CollectionInfo {
                name: name.clone(),
                count: 1,
                metadata: serde_json::json!({}),
            })
            .collect())
    }

    async fn health(&self) -> DomainResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_canned_response_and_recording() {
        let mock = MockRetrievalClient::new().with_documents("docs", "hello", 0.2);

        let response = mock.query("docs", "q", 3).await.unwrap();
        assert_eq!(response.results.len(), 1);
        assert!((response.results[0].distance - 0.2).abs() < f64::EPSILON);

        // Unknown collections return empty, not an error.
        let response = mock.query("other", "q", 3).await.unwrap();
        assert!(response.results.is_empty());

        assert_eq!(mock.queried(), vec!["docs", "other"]);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let mock = MockRetrievalClient::new().with_failure("docs", "boom");
        let err = mock.query("docs", "q", 3).await.unwrap_err();
        assert!(matches!(err, DomainError::Retrieval(_)));
    }
}

//! HTTP adapter for the vector-store wrapper service.
//!
//! The wrapper fronts ChromaDB and exposes three endpoints: `POST /query`
//! returning scored documents plus the collection's metadata, `GET
//! /collections` listing collections, and `GET /health`. Distances are
//! cosine distances, smaller is closer.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{CollectionInfo, RetrievalClient, RetrievalResponse, ScoredDocument};

#[derive(Debug, Clone)]
pub struct ChromaHttpConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ChromaHttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5006".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ChromaHttpConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct ChromaHttpClient {
    config: ChromaHttpConfig,
    http: reqwest::Client,
}

impl ChromaHttpClient {
    pub fn new(config: ChromaHttpConfig) -> DomainResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DomainError::Retrieval(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
    top_k: usize,
    collection: &'a str,
}

#[derive(Deserialize)]
struct QueryWire {
    #[serde(default)]
    results: Vec<ScoredDocument>,
    #[serde(default)]
    collection_metadata: serde_json::Value,
}

#[derive(Deserialize)]
struct CollectionsWire {
    #[serde(default)]
    collections: Vec<CollectionInfo>,
}

#[async_trait]
impl RetrievalClient for ChromaHttpClient {
    fn name(&self) -> &str {
        "chroma_http"
    }

    async fn query(
        &self,
        collection: &str,
        text: &str,
        top_k: usize,
    ) -> DomainResult<RetrievalResponse> {
        debug!(%collection, top_k, "Querying retrieval service");
        let response = self
            .http
            .post(self.url("/query"))
            .json(&QueryBody {
                query: text,
                top_k,
                collection,
            })
            .send()
            .await
            .map_err(|e| DomainError::Retrieval(format!("Query request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DomainError::Retrieval(format!(
                "Query for '{collection}' failed with status {status}: {detail}"
            )));
        }

        let wire: QueryWire = response
            .json()
            .await
            .map_err(|e| DomainError::Retrieval(format!("Malformed query response: {e}")))?;
        Ok(RetrievalResponse {
            results: wire.results,
            collection_metadata: wire.collection_metadata,
        })
    }

    async fn list_collections(&self) -> DomainResult<Vec<CollectionInfo>> {
        let response = self
            .http
            .get(self.url("/collections"))
            .send()
            .await
            .map_err(|e| DomainError::Retrieval(format!("Collections request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::Retrieval(format!(
                "Collections listing failed with status {status}"
            )));
        }

        let wire: CollectionsWire = response
            .json()
            .await
            .map_err(|e| DomainError::Retrieval(format!("Malformed collections response: {e}")))?;
        Ok(wire.collections)
    }

    async fn health(&self) -> DomainResult<bool> {
        let response = self
            .http
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|e| DomainError::Retrieval(format!("Health check failed: {e}")))?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(base_url: &str) -> ChromaHttpClient {
        ChromaHttpClient::new(
            ChromaHttpConfig::default()
                .with_base_url(base_url)
                .with_timeout(Duration::from_secs(5)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_query_parses_results_and_metadata() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/query")
            .match_body(mockito::Matcher::Json(json!({
                "query": "reset password",
                "top_k": 3,
                "collection": "faq"
            })))
            .with_status(200)
            .with_body(
                json!({
                    "results": [
                        {"text": "Use the reset link.", "metadata": {"page": 1}, "distance": 0.12},
                        {"text": "Contact support.", "metadata": {}, "distance": 0.4}
                    ],
                    "collection_metadata": {"description": "Product FAQ", "token_limit": 500}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let response = client(&server.url())
            .query("faq", "reset password", 3)
            .await
            .unwrap();
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].text, "Use the reset link.");
        assert!((response.results[0].distance - 0.12).abs() < f64::EPSILON);
        assert_eq!(
            response.collection_metadata["description"],
            json!("Product FAQ")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_query_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/query")
            .with_status(404)
            .with_body(json!({"error": "Collection 'faq' not found"}).to_string())
            .create_async()
            .await;

        let err = client(&server.url()).query("faq", "q", 3).await.unwrap_err();
        assert!(matches!(err, DomainError::Retrieval(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_list_collections() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/collections")
            .with_status(200)
            .with_body(
                json!({
                    "collections": [
                        {"name": "faq", "count": 42, "metadata": {"description": "Product FAQ"}},
                        {"name": "guides", "count": 7, "metadata": {}}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let collections = client(&server.url()).list_collections().await.unwrap();
        assert_eq!(collections.len(), 2);
        assert_eq!(collections[0].name, "faq");
        assert_eq!(collections[0].count, 42);
    }

    #[tokio::test]
    async fn test_health() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(json!({"status": "healthy"}).to_string())
            .create_async()
            .await;

        assert!(client(&server.url()).health().await.unwrap());
    }
}

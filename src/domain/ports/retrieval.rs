//! Port for nearest-neighbor retrieval services.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;

/// One scored document from a retrieval query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Cosine distance; smaller is closer.
    pub distance: f64,
}

/// Response of a retrieval query: documents plus the collection's metadata
/// (description, prompt/token-limit overrides, embedding settings, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResponse {
    #[serde(default)]
    pub results: Vec<ScoredDocument>,
    #[serde(default)]
    pub collection_metadata: serde_json::Value,
}

/// Summary of a collection as listed by the retrieval service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Port trait for vector-store query services.
///
/// The collector treats `DomainError::Retrieval` as "no results for this
/// collection", never as fatal; the CLI surfaces it.
#[async_trait]
pub trait RetrievalClient: Send + Sync {
    /// Adapter name, for logging.
    fn name(&self) -> &str;

    /// Query a collection for the nearest documents to `text`.
    async fn query(
        &self,
        collection: &str,
        text: &str,
        top_k: usize,
    ) -> DomainResult<RetrievalResponse>;

    /// List the service's collections.
    async fn list_collections(&self) -> DomainResult<Vec<CollectionInfo>>;

    /// Whether the service is reachable and healthy.
    async fn health(&self) -> DomainResult<bool>;
}

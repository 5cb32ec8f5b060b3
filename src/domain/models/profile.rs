//! Request profile: the immutable record the rule matcher and templates
//! consume.

use serde::{Deserialize, Serialize};

/// Whether the turn opened a new conversation topic or continued one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    NewTopic,
    Continuation,
}

/// Three-way summary of retrieval across all queried collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RagResult {
    /// At least one collection cleared the match threshold.
    Match,
    /// No match, but at least one collection cleared the partial threshold.
    Partial,
    /// Nothing cleared either threshold.
    None,
}

/// Classification of a single collection's best distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Match,
    Partial,
}

/// A `(service, collection)` pair selected for retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionRef {
    pub service: String,
    pub collection: String,
}

impl CollectionRef {
    pub fn new(service: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            collection: collection.into(),
        }
    }

    /// `service/collection` form, used as a synthetic intent category name.
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.service, self.collection)
    }
}

/// A document returned by the retrieval service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// One retained result per queried collection that cleared at least the
/// partial threshold. Created during collection, immutable afterward, and
/// kept for expanded-context templating even when a different entry drove
/// the rule match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalEntry {
    pub service: String,
    pub collection: String,
    pub documents: Vec<RetrievedDocument>,
    /// Best (smallest) distance among the returned documents.
    pub distance: f64,
    pub classification: Classification,
    /// Collection description, from config or service metadata.
    pub description: String,
    /// Per-collection prompt template override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_override: Option<String>,
    /// Per-collection max-token override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_limit_override: Option<u32>,
}

impl RetrievalEntry {
    pub fn collection_ref(&self) -> CollectionRef {
        CollectionRef::new(&self.service, &self.collection)
    }

    /// Concatenated document texts, one per line block.
    pub fn joined_documents(&self) -> String {
        self.documents
            .iter()
            .map(|d| d.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Immutable per-request profile built once after the data-collection stages
/// and consumed read-only by the rule matcher and template rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_message: String,
    pub topic: String,
    pub topic_status: TopicStatus,
    pub rag_result: RagResult,
    pub rag_entries: Vec<RetrievalEntry>,
    pub intent: Option<String>,
    pub selected_collections: Vec<CollectionRef>,
}

impl Profile {
    /// The entry that determined `rag_result`, when one matched.
    pub fn matched_entry(&self) -> Option<&RetrievalEntry> {
        self.rag_entries
            .iter()
            .find(|e| e.classification == Classification::Match)
    }

    /// All partial entries, in collection order.
    pub fn partial_entries(&self) -> impl Iterator<Item = &RetrievalEntry> {
        self.rag_entries
            .iter()
            .filter(|e| e.classification == Classification::Partial)
    }
}

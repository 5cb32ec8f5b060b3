//! Retrieval collector: queries the selected collections and classifies
//! each best distance against the configured thresholds.
//!
//! The collector is pure data collection. It never calls the language model
//! and never makes routing decisions; deciding on what was collected belongs
//! to the rule matcher.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::domain::models::{
    Classification, CollectionRef, CollectorMode, Config, RagResult, RetrievalEntry,
    RetrievedDocument,
};
use crate::domain::ports::{RetrievalClient, RetrievalResponse};

/// Output of the collection phase: every retained entry plus the summary.
#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    pub entries: Vec<RetrievalEntry>,
    pub rag_result: RagResult,
}

/// Classify a distance against two thresholds. Strict `<` on the match
/// threshold: a distance exactly at it is partial, not match.
pub fn classify_distance(
    distance: f64,
    match_threshold: f64,
    partial_threshold: f64,
) -> Option<Classification> {
    if distance < match_threshold {
        Some(Classification::Match)
    } else if distance < partial_threshold {
        Some(Classification::Partial)
    } else {
        None
    }
}

/// Orchestrates the retrieval client across the selected collections.
pub struct RetrievalCollector {
    client: Arc<dyn RetrievalClient>,
    config: Arc<Config>,
}

impl RetrievalCollector {
    pub fn new(client: Arc<dyn RetrievalClient>, config: Arc<Config>) -> Self {
        Self { client, config }
    }

    /// Query the selected pairs with `query_basis` and classify results.
    ///
    /// Iteration follows the caller-provided pair order. `Mode::First` stops
    /// as soon as a match is found; partial hits collected on the way are
    /// kept. `Mode::All` queries every pair concurrently and retains every
    /// match and partial, still reported in caller order.
    pub async fn collect(
        &self,
        pairs: &[CollectionRef],
        query_basis: &str,
    ) -> CollectionOutcome {
        let entries = match self.config.retrieval.mode {
            CollectorMode::First => self.collect_first(pairs, query_basis).await,
            CollectorMode::All => self.collect_all(pairs, query_basis).await,
        };

        let rag_result = summarize(&entries);
        debug!(
            entries = entries.len(),
            result = ?rag_result,
            "Retrieval collection finished"
        );
        CollectionOutcome {
            entries,
            rag_result,
        }
    }

    async fn collect_first(
        &self,
        pairs: &[CollectionRef],
        query_basis: &str,
    ) -> Vec<RetrievalEntry> {
        let mut entries = Vec::new();
        for pair in pairs {
            if let Some(entry) = self.query_one(pair, query_basis).await {
                let matched = entry.classification == Classification::Match;
                entries.push(entry);
                if matched {
                    break;
                }
            }
        }
        entries
    }

    async fn collect_all(
        &self,
        pairs: &[CollectionRef],
        query_basis: &str,
    ) -> Vec<RetrievalEntry> {
        // Independent queries, no ordering dependency between them; the
        // output still follows the caller's pair order.
        let results = join_all(
            pairs
                .iter()
                .map(|pair| self.query_one(pair, query_basis)),
        )
        .await;
        results.into_iter().flatten().collect()
    }

    /// Query a single pair; `None` when nothing cleared the partial
    /// threshold or the query failed (never fatal).
    async fn query_one(&self, pair: &CollectionRef, query_basis: &str) -> Option<RetrievalEntry> {
        let response = match self
            .client
            .query(&pair.collection, query_basis, self.config.retrieval.top_k)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    collection = %pair.qualified_name(),
                    error = %err,
                    "Retrieval query failed, treating as no results"
                );
                return None;
            }
        };

        let best_distance = response
            .results
            .iter()
            .map(|d| d.distance)
            .fold(f64::INFINITY, f64::min);
        if response.results.is_empty() {
            return None;
        }

        let match_threshold = self
            .config
            .match_threshold_for(&pair.service, &pair.collection);
        let partial_threshold = self
            .config
            .partial_threshold_for(&pair.service, &pair.collection);

        let classification =
            classify_distance(best_distance, match_threshold, partial_threshold)?;

        debug!(
            collection = %pair.qualified_name(),
            distance = best_distance,
            classification = ?classification,
            "Collection classified"
        );

        Some(self.build_entry(pair, response, best_distance, classification))
    }

    fn build_entry(
        &self,
        pair: &CollectionRef,
        response: RetrievalResponse,
        distance: f64,
        classification: Classification,
    ) -> RetrievalEntry {
        let collection_config = self
            .config
            .collection_config(&pair.service, &pair.collection);

        // Collection config wins over service-side metadata for overrides.
        let metadata = &response.collection_metadata;
        let description = collection_config
            .map(|c| c.description.clone())
            .filter(|d| !d.is_empty())
            .or_else(|| {
                metadata
                    .get("description")
                    .and_then(|v| v.as_str())
                    .map(String::from)
            })
            .unwrap_or_default();
        let prompt_override = collection_config
            .and_then(|c| c.prompt.clone())
            .or_else(|| {
                metadata
                    .get("prompt")
                    .and_then(|v| v.as_str())
                    .map(String::from)
            });
        let token_limit_override = collection_config
            .and_then(|c| c.token_limit)
            .or_else(|| {
                metadata
                    .get("token_limit")
                    .and_then(serde_json::Value::as_u64)
                    .and_then(|v| u32::try_from(v).ok())
            });

        RetrievalEntry {
            service: pair.service.clone(),
            collection: pair.collection.clone(),
            documents: response
                .results
                .into_iter()
                .map(|d| RetrievedDocument {
                    text: d.text,
                    metadata: d.metadata,
                })
                .collect(),
            distance,
            classification,
            description,
            prompt_override,
            token_limit_override,
        }
    }
}

fn summarize(entries: &[RetrievalEntry]) -> RagResult {
    if entries
        .iter()
        .any(|e| e.classification == Classification::Match)
    {
        RagResult::Match
    } else if entries
        .iter()
        .any(|e| e.classification == Classification::Partial)
    {
        RagResult::Partial
    } else {
        RagResult::None
    }
}

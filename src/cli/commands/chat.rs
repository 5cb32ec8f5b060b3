//! `arbiter chat`: run one pipeline turn.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use serde_json::json;

use crate::adapters::llm::ModelRegistry;
use crate::adapters::retrieval::{ChromaHttpClient, ChromaHttpConfig};
use crate::adapters::tools::registry_from_config;
use crate::application::{Pipeline, TurnRequest};
use crate::domain::models::{CollectionRef, Config};

#[derive(Args)]
pub struct ChatArgs {
    /// The user message for this turn.
    pub message: String,

    /// Prior topic carried over from the previous turn, if any.
    #[arg(short, long, default_value = "")]
    pub topic: String,

    /// Collections to consult, as service/collection. Repeatable; defaults
    /// to every configured collection.
    #[arg(short = 'l', long = "collection", value_parser = parse_collection)]
    pub collections: Vec<CollectionRef>,

    /// Route through rules gated on reasoning.
    #[arg(long)]
    pub reasoning: bool,
}

fn parse_collection(value: &str) -> Result<CollectionRef, String> {
    match value.split_once('/') {
        Some((service, collection)) if !service.is_empty() && !collection.is_empty() => {
            Ok(CollectionRef {
                service: service.to_string(),
                collection: collection.to_string(),
            })
        }
        _ => Err(format!("Expected service/collection, got '{value}'")),
    }
}

pub async fn run(config: Config, args: ChatArgs, json: bool) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let models =
        ModelRegistry::from_config(&config.models).context("Failed to build model registry")?;
    let retrieval = ChromaHttpClient::new(
        ChromaHttpConfig::default()
            .with_base_url(config.retrieval.base_url.clone())
            .with_timeout(Duration::from_secs(config.retrieval.timeout_secs)),
    )
    .context("Failed to build retrieval client")?;
    let tools = registry_from_config(&config.tools).context("Failed to build tool registry")?;

    let pipeline = Pipeline::new(Arc::clone(&config), models, Arc::new(retrieval), tools);
    let response = pipeline
        .run(TurnRequest {
            user_message: args.message,
            prior_topic: args.topic,
            selected_collections: args.collections,
            reasoning_requested: args.reasoning,
        })
        .await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "content": response.content,
                "topic": response.topic,
                "topic_status": response.topic_status,
                "rag_result": response.rag_result,
                "matched_rule_index": response.matched_rule_index,
                "tool_calls": response.tool_calls,
            }))?
        );
    } else {
        println!("{}", response.content);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collection() {
        let parsed = parse_collection("docs/faq").unwrap();
        assert_eq!(parsed.service, "docs");
        assert_eq!(parsed.collection, "faq");

        assert!(parse_collection("docs").is_err());
        assert!(parse_collection("/faq").is_err());
        assert!(parse_collection("docs/").is_err());
    }
}

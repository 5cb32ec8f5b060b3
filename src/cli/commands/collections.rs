//! `arbiter collections`: list the retrieval service's collections.

use std::time::Duration;

use anyhow::Context;

use crate::adapters::retrieval::{ChromaHttpClient, ChromaHttpConfig};
use crate::domain::models::Config;
use crate::domain::ports::RetrievalClient;

pub async fn run(config: &Config, json: bool) -> anyhow::Result<()> {
    let client = ChromaHttpClient::new(
        ChromaHttpConfig::default()
            .with_base_url(config.retrieval.base_url.clone())
            .with_timeout(Duration::from_secs(config.retrieval.timeout_secs)),
    )
    .context("Failed to build retrieval client")?;

    let collections = client
        .list_collections()
        .await
        .context("Failed to list collections")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&collections)?);
    } else {
        for collection in collections {
            let description = collection
                .metadata
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            println!("{}  ({} documents)  {description}", collection.name, collection.count);
        }
    }
    Ok(())
}

//! `arbiter tools`: list the registered tools.

use anyhow::Context;
use serde_json::json;

use crate::adapters::tools::registry_from_config;
use crate::domain::models::Config;

pub fn run(config: &Config, json: bool) -> anyhow::Result<()> {
    let registry = registry_from_config(&config.tools).context("Failed to build tool registry")?;
    let definitions = registry.definitions();

    if json {
        let listing: Vec<_> = definitions
            .iter()
            .map(|d| {
                json!({
                    "name": d.name,
                    "description": d.description,
                    "kind": d.kind,
                    "timeout_secs": d.timeout_secs.unwrap_or(config.tools.default_timeout_secs),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        for definition in definitions {
            println!("{}  {}", definition.name, definition.description);
        }
    }
    Ok(())
}

//! `arbiter config`: print the effective merged configuration.

use crate::domain::models::Config;

pub fn run(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!("{}", serde_yaml::to_string(config)?);
    }
    Ok(())
}

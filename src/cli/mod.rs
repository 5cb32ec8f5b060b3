//! Command-line interface.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "arbiter", version, about = "Conversational routing pipeline")]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, global = true, env = "ARBITER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON instead of plain text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one pipeline turn against the configured services.
    Chat(commands::chat::ChatArgs),
    /// Show the effective configuration after all layers are merged.
    Config,
    /// List the registered tools.
    Tools,
    /// List the retrieval service's collections.
    Collections,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = crate::infrastructure::config::load(cli.config.as_deref())?;
    crate::infrastructure::logging::init(&config.logging);

    match cli.command {
        Command::Chat(args) => commands::chat::run(config, args, cli.json).await,
        Command::Config => commands::config::run(&config, cli.json),
        Command::Tools => commands::tools::run(&config, cli.json),
        Command::Collections => commands::collections::run(&config, cli.json).await,
    }
}

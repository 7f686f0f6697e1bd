//! Command-line interface

pub mod commands;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::api::BaasClient;
use crate::config::Config;
use commands::collections::CollectionsCommands;
use commands::query::{ExportCommands, QueryCommands};
use commands::write::{KeyedWriteCommands, PushCommands};

#[derive(Parser, Debug)]
#[command(name = "baas-cli", version, about = "Bulk data exchange with a BaaS entity store")]
pub struct Cli {
    /// Config file (default: <config dir>/baas-cli/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging for this crate (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List collection names
    Collections(CollectionsCommands),
    /// Fetch every entity matching a filter
    Get(QueryCommands),
    /// Fetch the first entity matching a filter
    First(QueryCommands),
    /// Save a collection and its attachments to disk
    Export(ExportCommands),
    /// Create, update or delete entities from a JSON file
    Push(PushCommands),
    /// Update entities found by natural key, creating the rest
    Upsert(KeyedWriteCommands),
    /// Delete entities found by natural key
    DeleteBy(KeyedWriteCommands),
}

/// Build a client from the config file and environment
pub fn connect(config_path: Option<&Path>) -> Result<BaasClient> {
    let mut config = Config::load(config_path).context("Failed to load configuration")?;
    config.prompt_missing_secret()?;
    BaasClient::from_config(&config).context("Invalid configuration")
}

pub async fn run(cli: Cli) -> Result<()> {
    if cli.no_color {
        colored::control::set_override(false);
    }

    let client = connect(cli.config.as_deref())?;

    match cli.command {
        Commands::Collections(args) => commands::collections::handler::handle_collections_command(&client, args).await,
        Commands::Get(args) => commands::query::handler::handle_get_command(&client, args).await,
        Commands::First(args) => commands::query::handler::handle_first_command(&client, args).await,
        Commands::Export(args) => commands::query::handler::handle_export_command(&client, args).await,
        Commands::Push(args) => commands::write::handler::handle_push_command(&client, args).await,
        Commands::Upsert(args) => commands::write::handler::handle_upsert_command(&client, args).await,
        Commands::DeleteBy(args) => commands::write::handler::handle_delete_by_command(&client, args).await,
    }
}

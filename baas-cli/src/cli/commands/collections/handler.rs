use anyhow::{Context, Result};
use colored::*;

use super::CollectionsCommands;
use crate::api::BaasClient;

pub async fn handle_collections_command(client: &BaasClient, args: CollectionsCommands) -> Result<()> {
    let mut names = client
        .collections(&args.which)
        .await
        .context("Failed to list collections")?;
    names.sort();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&names)?);
        return Ok(());
    }

    if names.is_empty() {
        eprintln!("{}", "No collections found".yellow());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

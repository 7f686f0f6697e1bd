//! Write command handlers

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::*;
use serde_json::Value;

use super::{BatchArgs, KeyedWriteCommands, PushCommands};
use crate::api::{BaasClient, BatchJobResult, BatchOptions, TerminalProgress, TraceSink, WriteOperation, normalize_items};
use crate::cli::commands::query::OutputFormat;
use crate::cli::commands::query::handler::emit;
use crate::files;

pub async fn handle_push_command(client: &BaasClient, args: PushCommands) -> Result<()> {
    let operation = WriteOperation::from(args.operation);
    let items = read_items(&args.input).await?;
    let options = batch_options(&args.batch, operation.operation_type()).await?;

    let result = client
        .write(operation, &args.collection, items, &options)
        .await
        .with_context(|| format!("Failed to {} entities in '{}'", operation, args.collection))?;

    report(operation.operation_type(), &args.collection, &result);
    emit(&Value::Array(result.entities), OutputFormat::Json, args.output.as_deref()).await
}

pub async fn handle_upsert_command(client: &BaasClient, args: KeyedWriteCommands) -> Result<()> {
    let items = read_items(&args.input).await?;
    let options = batch_options(&args.batch, "upsert").await?;

    let result = client
        .upsert_by(&args.collection, items, args.keys.as_slice(), &options)
        .await
        .with_context(|| format!("Failed to upsert entities in '{}'", args.collection))?;

    report("upsert", &args.collection, &result);
    emit(&Value::Array(result.entities), OutputFormat::Json, args.output.as_deref()).await
}

pub async fn handle_delete_by_command(client: &BaasClient, args: KeyedWriteCommands) -> Result<()> {
    let items = read_items(&args.input).await?;
    let options = batch_options(&args.batch, "delete").await?;

    let result = client
        .delete_by(&args.collection, items, args.keys.as_slice(), &options)
        .await
        .with_context(|| format!("Failed to delete entities in '{}'", args.collection))?;

    report("delete", &args.collection, &result);
    emit(&Value::Array(result.entities), OutputFormat::Json, args.output.as_deref()).await
}

/// Entities from a JSON file: one object, an array, or null
async fn read_items(path: &Path) -> Result<Vec<Value>> {
    let value = files::read(path)
        .await
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    if let Value::String(_) = value {
        anyhow::bail!("Input file must be a .json file: {}", path.display());
    }
    Ok(normalize_items(value))
}

async fn batch_options(args: &BatchArgs, label: &str) -> Result<BatchOptions> {
    let mut options = BatchOptions::default()
        .batch_size(usize::try_from(args.batch_size).unwrap_or(usize::MAX))
        .inter_batch_delay(args.inter_batch_delay())
        .max_retries(args.max_retries);

    if let Some(path) = &args.trace {
        let sink = TraceSink::open(path)
            .await
            .with_context(|| format!("Failed to open trace file: {}", path.display()))?;
        options = options.trace(Arc::new(sink));
    }
    if args.progress {
        options = options.progress(Arc::new(TerminalProgress::new(label)));
    }
    Ok(options)
}

fn report(label: &str, collection: &str, result: &BatchJobResult) {
    let mut line = format!(
        "{} {} {} entities in {} ({} batch(es))",
        "✓".green(),
        label,
        result.entities.len(),
        collection.bold(),
        result.batches
    );
    if result.retries.total_retries > 0 {
        line.push_str(&format!(
            ", {} retries (dns: {}, timeouts: {}, resets: {})",
            result.retries.total_retries.to_string().yellow(),
            result.retries.dns_failures,
            result.retries.timeouts,
            result.retries.socket_resets
        ));
    }
    eprintln!("{}", line);
}

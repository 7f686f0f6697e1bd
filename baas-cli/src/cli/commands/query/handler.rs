//! Read command handlers

use anyhow::{Context, Result};
use colored::*;
use serde_json::Value;

use super::{ExportCommands, OutputFormat, QueryCommands};
use crate::api::BaasClient;
use crate::files;

/// Fetch every entity matching the filter
pub async fn handle_get_command(client: &BaasClient, args: QueryCommands) -> Result<()> {
    let filter = args.filter.to_filter()?;
    let mut paginator = client.paginator();
    if let Some(limit) = args.limit {
        paginator = paginator.page_size(limit);
    }

    let entities = paginator
        .fetch_all(&args.collection, filter)
        .await
        .with_context(|| format!("Failed to query '{}'", args.collection))?;

    eprintln!(
        "{} {} entities from {}",
        "Fetched".green(),
        entities.len(),
        args.collection.bold()
    );
    emit(&Value::Array(entities), args.format, args.output.as_deref()).await
}

/// Fetch the first matching entity; not-found is reported, not an error
pub async fn handle_first_command(client: &BaasClient, args: QueryCommands) -> Result<()> {
    let filter = args.filter.to_filter()?;
    let entity = client
        .fetch_first(&args.collection, filter)
        .await
        .with_context(|| format!("Failed to query '{}'", args.collection))?;

    match entity {
        Some(entity) => emit(&entity, args.format, args.output.as_deref()).await,
        None => {
            eprintln!("{} in {}", "No matching entity".yellow(), args.collection.bold());
            Ok(())
        }
    }
}

/// Export a collection to JSON, downloading attachments
pub async fn handle_export_command(client: &BaasClient, args: ExportCommands) -> Result<()> {
    let filter = args.filter.to_filter()?;
    let entities = client
        .get_and_save(&args.collection, filter, args.file.clone(), args.folder.clone())
        .await
        .with_context(|| format!("Failed to export '{}'", args.collection))?;

    let attachments = entities.iter().filter(|e| e.get("$file").is_some()).count();
    let file = args
        .file
        .unwrap_or_else(|| format!("{}.json", args.collection).into());
    eprintln!(
        "{} {} entities ({} attachments) to {}",
        "Exported".green(),
        entities.len(),
        attachments,
        file.display().to_string().bright_green()
    );
    Ok(())
}

/// Print or save `data` in the requested format
pub(crate) async fn emit(data: &Value, format: OutputFormat, output: Option<&std::path::Path>) -> Result<()> {
    let formatted = format_output(data, format)?;
    match output {
        Some(path) => {
            files::write(path, formatted.as_bytes())
                .await
                .with_context(|| format!("Failed to write output to: {}", path.display()))?;
            eprintln!("Results saved to: {}", path.display().to_string().bright_green());
        }
        None => println!("{}", formatted),
    }
    Ok(())
}

/// Format query results according to the specified output format
pub(crate) fn format_output(data: &Value, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(data).context("Failed to format JSON output"),
        OutputFormat::JsonCompact => serde_json::to_string(data).context("Failed to format JSON output"),
        OutputFormat::Csv => json_to_csv(data),
    }
}

/// Convert entities to CSV; the header is the sorted union of all fields
fn json_to_csv(data: &Value) -> Result<String> {
    let rows: Vec<&serde_json::Map<String, Value>> = match data {
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        Value::Object(obj) => vec![obj],
        other => {
            return Ok(format!("value\n{}\n", json_value_to_string(other)));
        }
    };

    let headers: std::collections::BTreeSet<&str> = rows.iter().flat_map(|row| row.keys().map(String::as_str)).collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&headers).context("Failed to write CSV header")?;
    for row in rows {
        let record: Vec<String> = headers
            .iter()
            .map(|h| row.get(*h).map(json_value_to_string).unwrap_or_default())
            .collect();
        writer.write_record(&record).context("Failed to write CSV row")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Convert a JSON value to a string representation
fn json_value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

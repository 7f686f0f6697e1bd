//! Read commands: get, first, export

pub mod handler;

use std::path::PathBuf;

use clap::{Args, ValueEnum};

use crate::api::Filter;

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// Single-line JSON
    JsonCompact,
    /// One row per entity, columns from the union of fields
    Csv,
}

/// Which entities a read selects
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Query-language fragment, e.g. "select * where age > 21"
    #[arg(short, long, conflicts_with = "matching")]
    pub ql: Option<String>,

    /// Equality filter as key=value; repeat to AND several
    #[arg(short = 'm', long = "match", value_name = "KEY=VALUE")]
    pub matching: Vec<String>,
}

impl FilterArgs {
    /// Values that parse as JSON (numbers, booleans) are compared unquoted
    pub fn to_filter(&self) -> anyhow::Result<Filter> {
        if let Some(ql) = &self.ql {
            return Ok(Filter::ql(ql.clone()));
        }
        if self.matching.is_empty() {
            return Ok(Filter::All);
        }
        let pairs = self
            .matching
            .iter()
            .map(|pair| {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| anyhow::anyhow!("Expected KEY=VALUE, got '{}'", pair))?;
                let value = match serde_json::from_str::<serde_json::Value>(value) {
                    Ok(parsed) if !parsed.is_object() && !parsed.is_array() => parsed,
                    _ => serde_json::Value::String(value.to_string()),
                };
                Ok((key.trim().to_string(), value))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Filter::Match(pairs))
    }
}

#[derive(Args, Debug, Clone)]
pub struct QueryCommands {
    /// Collection to read
    pub collection: String,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Entities per page (defaults to the configured page limit)
    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Write results to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ExportCommands {
    /// Collection to export
    pub collection: String,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Target JSON file (default: <collection>.json)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Attachment folder (default: <file without extension>_data)
    #[arg(long)]
    pub folder: Option<PathBuf>,
}

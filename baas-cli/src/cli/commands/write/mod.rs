//! Write commands: push, upsert, delete-by

pub mod handler;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};

use crate::api::WriteOperation;

/// CLI spelling of [`WriteOperation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PushOperation {
    Create,
    Update,
    Delete,
}

impl From<PushOperation> for WriteOperation {
    fn from(op: PushOperation) -> Self {
        match op {
            PushOperation::Create => WriteOperation::Create,
            PushOperation::Update => WriteOperation::Update,
            PushOperation::Delete => WriteOperation::Delete,
        }
    }
}

/// Batching and observability flags shared by every write command
#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Entities dispatched concurrently per batch
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: u64,

    /// Pause between batches in milliseconds
    #[arg(long, default_value_t = 0)]
    pub delay_ms: u64,

    /// Retries per entity after DNS, timeout or reset errors (never for create)
    #[arg(long, default_value_t = 0)]
    pub max_retries: u32,

    /// Append every response and the terminal error to this file
    #[arg(long)]
    pub trace: Option<PathBuf>,

    /// Show a live progress line on stderr
    #[arg(long)]
    pub progress: bool,
}

impl BatchArgs {
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Args, Debug, Clone)]
pub struct PushCommands {
    #[arg(value_enum)]
    pub operation: PushOperation,

    /// Target collection
    pub collection: String,

    /// JSON file holding one entity or an array of entities
    pub input: PathBuf,

    #[command(flatten)]
    pub batch: BatchArgs,

    /// Write the returned entities to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct KeyedWriteCommands {
    /// Target collection
    pub collection: String,

    /// JSON file holding one entity or an array of entities
    pub input: PathBuf,

    /// Natural-key properties used to find existing entities
    #[arg(short, long = "key", required = true, value_delimiter = ',')]
    pub keys: Vec<String>,

    #[command(flatten)]
    pub batch: BatchArgs,

    /// Write the returned entities to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

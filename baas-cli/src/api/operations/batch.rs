//! Batched write pipeline
//!
//! Items are sliced into batches in input order. Batches run one after the
//! other; the items of a batch are in flight together and their results are
//! collected in completion order. The first item that fails for good aborts
//! the whole run and everything collected so far is dropped.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use super::operation::WriteOperation;
use crate::api::client::BaasClient;
use crate::api::error::ApiError;
use crate::api::resilience::{ProgressReporter, RetryCounters, RetryPolicy, RetryStats, TraceSink};

/// Tuning for a single [`BatchWriter::run`]
#[derive(Clone)]
pub struct BatchOptions {
    /// Items per batch, at least 1
    pub batch_size: usize,
    /// Pause between consecutive batches. Not rate limited.
    pub inter_batch_delay: Duration,
    /// Retries per item for transient network faults; 0 disables retrying
    pub max_retries: u32,
    pub trace: Option<Arc<TraceSink>>,
    pub progress: Option<Arc<dyn ProgressReporter>>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 1,
            inter_batch_delay: Duration::ZERO,
            max_retries: 0,
            trace: None,
            progress: None,
        }
    }
}

impl std::fmt::Debug for BatchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOptions")
            .field("batch_size", &self.batch_size)
            .field("inter_batch_delay", &self.inter_batch_delay)
            .field("max_retries", &self.max_retries)
            .field("trace", &self.trace.is_some())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl BatchOptions {
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn inter_batch_delay(mut self, delay: Duration) -> Self {
        self.inter_batch_delay = delay;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn trace(mut self, trace: Arc<TraceSink>) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchJobResult {
    /// Server-returned entities in completion order
    pub entities: Vec<Value>,
    /// Number of batches dispatched
    pub batches: usize,
    pub retries: RetryStats,
}

/// Accept a single entity, an array of entities, or null
pub fn normalize_items(items: Value) -> Vec<Value> {
    match items {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        item => vec![item],
    }
}

/// Per-run state shared by the item futures
struct RunContext<'o> {
    operation: WriteOperation,
    collection: &'o str,
    policy: RetryPolicy,
    counters: RetryCounters,
    trace: Option<&'o TraceSink>,
}

pub struct BatchWriter<'a> {
    client: &'a BaasClient,
}

impl<'a> BatchWriter<'a> {
    pub fn new(client: &'a BaasClient) -> Self {
        Self { client }
    }

    pub async fn run(
        &self,
        operation: WriteOperation,
        collection: &str,
        items: Vec<Value>,
        options: &BatchOptions,
    ) -> Result<BatchJobResult, ApiError> {
        let batch_size = options.batch_size.max(1);
        let total = items.len();
        let batches = total.div_ceil(batch_size);
        let ctx = RunContext {
            operation,
            collection,
            policy: RetryPolicy::new(options.max_retries),
            counters: RetryCounters::new(),
            trace: options.trace.as_deref(),
        };

        info!(
            "Running {} of {} item(s) on '{}' in {} batch(es) of up to {}",
            operation, total, collection, batches, batch_size
        );

        let mut entities = Vec::with_capacity(total);
        let mut processed = 0;

        for (index, batch) in items.chunks(batch_size).enumerate() {
            if index > 0 && !options.inter_batch_delay.is_zero() {
                tokio::time::sleep(options.inter_batch_delay).await;
            }
            debug!("Dispatching batch {}/{} ({} item(s))", index + 1, batches, batch.len());

            let mut in_flight: FuturesUnordered<_> = batch.iter().map(|item| self.write_item(&ctx, item)).collect();

            while let Some(result) = in_flight.next().await {
                match result {
                    Ok(written) => entities.extend(written),
                    Err(e) => {
                        warn!("{} on '{}' aborted: {}", operation, collection, e);
                        if let Some(trace) = ctx.trace {
                            trace.record(&format!("ERROR {} {}: {}", operation, collection, e)).await;
                            trace.close().await;
                        }
                        if let Some(progress) = &options.progress {
                            progress.finish();
                        }
                        return Err(e);
                    }
                }
                processed += 1;
                if let Some(progress) = &options.progress {
                    progress.report(processed, total, &ctx.counters.snapshot());
                }
            }
        }

        if let Some(progress) = &options.progress {
            progress.finish();
        }
        let retries = ctx.counters.snapshot();
        info!(
            "Finished {} on '{}': {} entities, {} retries",
            operation,
            collection,
            entities.len(),
            retries.total_retries
        );

        Ok(BatchJobResult {
            entities,
            batches,
            retries,
        })
    }

    /// Issue one item, re-issuing it while the retry policy allows
    async fn write_item(&self, ctx: &RunContext<'_>, item: &Value) -> Result<Vec<Value>, ApiError> {
        let operation = ctx.operation.effective_for(item);
        if operation != ctx.operation {
            debug!("Item without uuid or name in '{}' is written as a {}", ctx.collection, operation);
        }
        let endpoint = self.client.endpoint();
        let mut retries = 0;

        loop {
            let result = self
                .client
                .request_json(|token| operation.build_request(endpoint, ctx.collection, item, token))
                .await;

            match result {
                Ok(response) => {
                    if let Some(trace) = ctx.trace {
                        let body = serde_json::to_string(&response.entities).unwrap_or_default();
                        trace.record(&format!("OK {} {} {}", operation, ctx.collection, body)).await;
                    }
                    return Ok(response.entities);
                }
                Err(e) if ctx.policy.should_retry(operation.allows_retry(), &e, retries) => {
                    if let Some(kind) = e.transport_kind() {
                        ctx.counters.record(kind);
                    }
                    retries += 1;
                    warn!(
                        "Retrying {} on '{}' ({}/{}): {}",
                        operation, ctx.collection, retries, ctx.policy.max_retries, e
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

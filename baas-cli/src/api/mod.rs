//! Entity-store API client
//!
//! Request orchestration against the BaaS HTTP API: credential caching,
//! outbound rate limiting, cursor pagination, batched writes with transient
//! retry, natural-key upserts and attachment transfer.

pub mod attachments;
pub mod auth;
pub mod client;
pub mod constants;
pub mod error;
pub mod models;
pub mod operations;
pub mod query;
pub mod resilience;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{ClientCredentials, TokenManager};
pub use client::{BaasClient, BaasClientBuilder};
pub use error::ApiError;
pub use models::{AccessToken, ApiResponse, Endpoint, QueryPage, entity_key};
pub use operations::{BatchJobResult, BatchOptions, BatchWriter, EntityUpsertResolver, WriteOperation, normalize_items};
pub use query::{Filter, QueryPaginator};
pub use resilience::{
    ProgressReporter, RateLimitConfig, RateLimiter, RateLimiterStats, RetryCounters, RetryPolicy, RetryStats,
    TerminalProgress, TraceSink,
};
pub use transport::{
    HttpRequest, HttpResponse, LocalFileFault, ReqwestTransport, Transport, TransportError, TransportErrorKind,
};

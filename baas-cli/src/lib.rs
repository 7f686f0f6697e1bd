//! Bulk data exchange with BaaS / Usergrid entity stores
//!
//! The [`api`] module holds the request orchestration: token caching, a
//! shared outbound rate limiter, cursor pagination, batched writes with
//! transient-error retry and natural-key upserts. [`BaasClient`] ties them
//! together.

pub mod api;
pub mod cli;
pub mod config;
pub mod files;

pub use api::{ApiError, BaasClient, BatchOptions, Filter, WriteOperation};
pub use config::{Config, Settings};

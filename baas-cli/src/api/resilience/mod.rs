//! Production resilience features
//!
//! Provides the shared outbound rate limiter, the transient-error retry
//! policy with its per-run counters, and the observational trace and
//! progress channels used by batch jobs.

pub mod config;
pub mod progress;
pub mod rate_limiter;
pub mod retry;
pub mod trace;

pub use config::{RateLimitConfig, RateLimitConfigBuilder};
pub use progress::{ProgressReporter, TerminalProgress};
pub use rate_limiter::{RateLimiter, RateLimiterStats};
pub use retry::{RetryCounters, RetryPolicy, RetryStats};
pub use trace::TraceSink;

//! Retry eligibility and per-run retry accounting

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::transport::TransportErrorKind;

/// Decides whether a failed item is re-issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Retries allowed per item; 0 disables retrying
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Only transient transport faults are retried, only for operations that are
    /// safe to repeat, and only while the item's retry budget lasts.
    pub fn should_retry(&self, operation_allows_retry: bool, error: &ApiError, retries_so_far: u32) -> bool {
        self.max_retries > 0
            && operation_allows_retry
            && error.is_transient()
            && retries_so_far < self.max_retries
    }
}

/// Retry counters of one top-level call. Observability only.
#[derive(Debug, Default)]
pub struct RetryCounters {
    dns_failures: AtomicU64,
    timeouts: AtomicU64,
    socket_resets: AtomicU64,
    total_retries: AtomicU64,
}

impl RetryCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one retry caused by `kind`
    pub fn record(&self, kind: TransportErrorKind) {
        let counter = match kind {
            TransportErrorKind::DnsNotFound => Some(&self.dns_failures),
            TransportErrorKind::ConnectTimeout | TransportErrorKind::SocketTimeout => Some(&self.timeouts),
            TransportErrorKind::ConnectionReset => Some(&self.socket_resets),
            TransportErrorKind::LocalIo | TransportErrorKind::Other => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        self.total_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RetryStats {
        RetryStats {
            dns_failures: self.dns_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            socket_resets: self.socket_resets.load(Ordering::Relaxed),
            total_retries: self.total_retries.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RetryCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryStats {
    pub dns_failures: u64,
    pub timeouts: u64,
    pub socket_resets: u64,
    pub total_retries: u64,
}

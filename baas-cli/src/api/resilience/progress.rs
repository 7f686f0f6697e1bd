//! Progress reporting for long-running batch jobs

use std::io::Write;

use colored::*;

use super::retry::RetryStats;

/// Observer notified after every completed item. Must not affect control flow.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, processed: usize, total: usize, retries: &RetryStats);

    /// Called once when the job ends, successfully or not
    fn finish(&self) {}
}

/// Rewrites a single status line on stderr
#[derive(Debug, Clone)]
pub struct TerminalProgress {
    label: String,
}

impl TerminalProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl ProgressReporter for TerminalProgress {
    fn report(&self, processed: usize, total: usize, retries: &RetryStats) {
        let mut stderr = std::io::stderr().lock();
        let _ = write!(
            stderr,
            "\r{} {}/{} processed | retries: {} (dns: {}, timeouts: {}, resets: {})",
            self.label.bold(),
            processed,
            total,
            retries.total_retries,
            retries.dns_failures,
            retries.timeouts,
            retries.socket_resets
        );
        let _ = stderr.flush();
    }

    fn finish(&self) {
        eprintln!();
    }
}

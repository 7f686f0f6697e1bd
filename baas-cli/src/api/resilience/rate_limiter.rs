//! Sliding-window rate limiter with optional even spacing
//!
//! Callers wait on a fair (FIFO) async mutex for their turn, then sleep until
//! the earliest instant at which starting would keep both invariants:
//! at most `permits_per_window` starts inside any `window`, and, when even
//! spacing is on, at least `window / permits_per_window` between two starts.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::config::RateLimitConfig;

#[derive(Debug, Default)]
struct Schedule {
    /// Start instants of the most recent `permits_per_window` tasks
    recent: VecDeque<Instant>,
}

/// Gate in front of every outbound request of a client
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    schedule: Mutex<Schedule>,
    started: AtomicU64,
    delayed: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            schedule: Mutex::new(Schedule::default()),
            started: AtomicU64::new(0),
            delayed: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Wait until a task may start. Waiters are released in arrival order.
    pub async fn acquire(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
        if !self.config.enabled {
            return;
        }

        let permits = self.config.permits_per_window.max(1) as usize;
        let mut schedule = self.schedule.lock().await;

        let now = Instant::now();
        let mut start = now;
        if self.config.even_spacing {
            if let Some(last) = schedule.recent.back() {
                start = start.max(*last + self.config.spacing());
            }
        }
        if schedule.recent.len() >= permits {
            let oldest = schedule.recent[schedule.recent.len() - permits];
            start = start.max(oldest + self.config.window);
        }

        if start > now {
            self.delayed.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Rate limiter: delaying request by {}ms",
                (start - now).as_millis()
            );
            tokio::time::sleep_until(start).await;
        }

        schedule.recent.push_back(Instant::now());
        while schedule.recent.len() > permits {
            schedule.recent.pop_front();
        }
    }

    /// Run `task` once a permit is available
    pub async fn schedule<F, Fut, T>(&self, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.acquire().await;
        task().await
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            started: self.started.load(Ordering::Relaxed),
            delayed: self.delayed.load(Ordering::Relaxed),
            enabled: self.config.enabled,
        }
    }
}

/// Counters for the rate limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterStats {
    /// Tasks that passed the gate
    pub started: u64,
    /// Tasks that had to wait for a slot
    pub delayed: u64,
    pub enabled: bool,
}

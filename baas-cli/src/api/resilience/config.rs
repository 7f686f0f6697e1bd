//! Rate limit configuration with builder pattern

use std::time::Duration;

use crate::api::constants::{DEFAULT_THROTTLE_PER_MINUTE, THROTTLE_WINDOW_MS};

/// Outbound request ceiling shared by every call made through one client.
/// Immutable once the limiter is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed to start within any `window`
    pub permits_per_window: u32,
    pub window: Duration,
    /// Spread starts uniformly across the window instead of front-loading them
    pub even_spacing: bool,
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            permits_per_window: DEFAULT_THROTTLE_PER_MINUTE,
            window: Duration::from_millis(THROTTLE_WINDOW_MS),
            even_spacing: true,
            enabled: true,
        }
    }
}

impl RateLimitConfig {
    /// Create a new builder for RateLimitConfig
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::new()
    }

    /// `requests` per 60 second window, evenly spaced
    pub fn per_minute(requests: u32) -> Self {
        Self {
            permits_per_window: requests,
            ..Self::default()
        }
    }

    /// No limiting at all (for testing)
    pub fn disabled() -> Self {
        Self {
            permits_per_window: u32::MAX,
            window: Duration::from_millis(THROTTLE_WINDOW_MS),
            even_spacing: false,
            enabled: false,
        }
    }

    /// Minimum gap between two starts when evenly spaced
    pub fn spacing(&self) -> Duration {
        if self.permits_per_window == 0 {
            return self.window;
        }
        self.window / self.permits_per_window
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if self.permits_per_window == 0 {
            return Err("permits_per_window must be greater than 0".to_string());
        }
        if self.window.is_zero() {
            return Err("window must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Builder for RateLimitConfig
#[derive(Debug)]
pub struct RateLimitConfigBuilder {
    config: RateLimitConfig,
}

impl RateLimitConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RateLimitConfig::default(),
        }
    }

    /// Set the number of requests allowed per window
    pub fn permits_per_window(mut self, permits: u32) -> Self {
        self.config.permits_per_window = permits;
        self
    }

    /// Set the window length
    pub fn window(mut self, window: Duration) -> Self {
        self.config.window = window;
        self
    }

    /// Enable/disable even spacing
    pub fn even_spacing(mut self, enabled: bool) -> Self {
        self.config.even_spacing = enabled;
        self
    }

    /// Enable/disable rate limiting
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Result<RateLimitConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for RateLimitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Readiness configuration.
//!
//! Timing settings for health check strategies, loadable from any serde
//! format and applied with [`HealthCheckStrategy::with_config`].
//!
//! [`HealthCheckStrategy::with_config`]: crate::strategy::HealthCheckStrategy::with_config

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::strategy::{
    DEFAULT_RETRIES, DEFAULT_START_PERIOD, DEFAULT_TEST_INTERVAL, DEFAULT_TEST_TIMEOUT,
};

/// Timing configuration for a health check strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Pause between attempts.
    pub test_interval: Duration,

    /// Time limit for a single attempt.
    pub test_timeout: Duration,

    /// Number of counted failures tolerated before giving up.
    pub retries: u32,

    /// Grace period during which failures are not counted.
    pub start_period: Duration,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            test_interval: DEFAULT_TEST_INTERVAL,
            test_timeout: DEFAULT_TEST_TIMEOUT,
            retries: DEFAULT_RETRIES,
            start_period: DEFAULT_START_PERIOD,
        }
    }
}

impl HealthCheckConfig {
    /// Config tuned for local development: fast polling, generous budget.
    pub fn development() -> Self {
        Self {
            test_interval: Duration::from_millis(500),
            test_timeout: Duration::from_secs(5),
            retries: 20,
            start_period: Duration::from_secs(5),
        }
    }

    /// Worst-case time spent after the start period before giving up,
    /// assuming every attempt runs to its timeout.
    pub fn max_counted_wait(&self) -> Duration {
        self.test_interval
            .saturating_add(self.test_timeout)
            .checked_mul(self.retries.saturating_add(1))
            .unwrap_or(Duration::MAX)
    }
}

//! Connection and resilience option records

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, WardenError};

/// Default number of retries after a transient failure
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default pause between retries, in seconds
pub const DEFAULT_SLEEP_BETWEEN_RETRIES: f64 = 1.0;

/// Options handed to the client library when a connection is built
///
/// Options missing from a configuration document keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Connections kept per host
    pool_size: u32,
    /// Socket timeout in seconds
    timeout: u64,
    /// Whether reads may be served by secondaries
    #[serde(alias = "read_preference", alias = "use_slave")]
    slave_ok: bool,
}

impl ConnectionOptions {
    pub fn new(pool_size: u32, timeout_secs: u64) -> Self {
        Self {
            pool_size,
            timeout: timeout_secs,
            slave_ok: false,
        }
    }

    /// Allow reads from secondaries
    pub fn with_slave_ok(mut self, slave_ok: bool) -> Self {
        self.slave_ok = slave_ok;
        self
    }

    pub fn pool_size(&self) -> u32 {
        self.pool_size
    }

    /// Get the socket timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn slave_ok(&self) -> bool {
        self.slave_ok
    }
}

impl Default for ConnectionOptions {
    /// Defaults:
    /// - pool_size: 5
    /// - timeout: 5 seconds
    /// - slave_ok: false
    fn default() -> Self {
        Self::new(5, 5)
    }
}

/// Retry policy knobs read from the `resilience_options` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceOptions {
    max_retries: u32,
    /// Pause between retries, in seconds
    sleep_between_retries: f64,
}

impl ResilienceOptions {
    pub fn new(max_retries: u32, sleep_between_retries: f64) -> Self {
        Self {
            max_retries,
            sleep_between_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Pause between retries in seconds, as configured
    pub fn sleep_between_retries(&self) -> f64 {
        self.sleep_between_retries
    }

    /// Pause between retries as a Duration
    pub fn sleep_interval(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.sleep_between_retries).map_err(|_| {
            WardenError::Configuration(format!(
                "sleep_between_retries must be a non-negative number of seconds, got {}",
                self.sleep_between_retries
            ))
        })
    }
}

impl Default for ResilienceOptions {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_SLEEP_BETWEEN_RETRIES)
    }
}

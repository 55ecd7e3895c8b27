//! Connection lifecycle and bounded-retry execution for Warden
//!
//! [`ConnectionManager`] owns configuration and the live connection handle.
//! [`RetryExecutor`] runs actions against it, reconnecting and retrying on
//! transient failures.

pub mod config;
mod manager;
pub mod retry;

#[cfg(test)]
mod test_support;

pub use config::{
    ConfigDocument, ConfigFile, ConfigFormat, ConfigSource, DEFAULT_CONFIG_PATH, EnvironmentConfig,
};
pub use manager::{ConnectionManager, FailureCallback};
pub use retry::{RetryExecutor, TransientPredicate};

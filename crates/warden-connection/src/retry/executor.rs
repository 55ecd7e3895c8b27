//! Retry loop over a shared connection manager

use std::fmt;
use std::sync::Arc;

use warden_core::{ConnectionRef, Result, WardenError};

use crate::manager::ConnectionManager;

/// Decides which errors trigger reconnect-and-retry
pub type TransientPredicate = Arc<dyn Fn(&WardenError) -> bool + Send + Sync>;

/// Runs actions with automatic reconnect and bounded retry
///
/// Retry budget, pause and failure callback are read from the manager on
/// every decision, so changes made through the manager apply to loops that
/// are already running.
#[derive(Clone)]
pub struct RetryExecutor {
    manager: Arc<ConnectionManager>,
    is_transient: TransientPredicate,
}

impl RetryExecutor {
    /// Create an executor retrying on [`WardenError::is_transient`] errors
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            manager,
            is_transient: Arc::new(WardenError::is_transient),
        }
    }

    /// Replace the transient-error predicate
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&WardenError) -> bool + Send + Sync + 'static,
    {
        self.is_transient = Arc::new(predicate);
        self
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Check whether an error would be retried
    pub fn is_transient(&self, error: &WardenError) -> bool {
        (self.is_transient)(error)
    }

    /// Run `action` against the live connection, retrying transient failures.
    ///
    /// Each attempt checks out the current connection, so an action that
    /// failed on a dropped connection runs against the replacement next
    /// time. A failed checkout counts as an attempt. Non-transient errors
    /// are returned immediately; once more than `max_retries` transient
    /// failures have been seen the last one is returned.
    pub fn execute<T, F>(&self, mut action: F) -> Result<T>
    where
        F: FnMut(&ConnectionRef) -> Result<T>,
    {
        let mut retries = 0u32;

        loop {
            let (error, used, generation) = match self.manager.try_checkout() {
                Ok((connection, generation)) => match action(&connection) {
                    Ok(value) => {
                        if retries > 0 {
                            tracing::info!(retries, "operation succeeded after reconnecting");
                        }
                        return Ok(value);
                    }
                    Err(error) => (error, Some(connection), generation),
                },
                Err((error, generation)) => (error, None, generation),
            };

            if !self.is_transient(&error) {
                return Err(error);
            }

            tracing::warn!(error = %error, attempt = retries + 1, "transient failure");
            if let Some(callback) = self.manager.failure_callback() {
                callback(&error, used.as_ref());
            }

            retries += 1;
            let max_retries = self.manager.max_retries();
            if retries > max_retries {
                tracing::error!(error = %error, max_retries, "retries exhausted");
                return Err(error);
            }

            if let Err(reconnect_error) = self.manager.reconnect_from(Some(generation)) {
                if !self.is_transient(&reconnect_error) {
                    return Err(reconnect_error);
                }
                tracing::warn!(error = %reconnect_error, "reconnect failed, retrying");
            }

            let pause = self.manager.sleep_interval();
            if !pause.is_zero() {
                tracing::debug!(?pause, retries, "waiting before retry");
                std::thread::sleep(pause);
            }
        }
    }
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

//! Bounded reconnect-and-retry execution
//!
//! A [`RetryExecutor`] runs an action against the manager's live connection.
//! Transient failures notify the failure callback, reconnect, pause and try
//! again until the manager's retry budget is spent.
//!
//! # Example
//!
//! ```ignore
//! use warden_connection::{ConnectionManager, RetryExecutor};
//!
//! let executor = RetryExecutor::new(manager.clone());
//! let count = executor.execute(|connection| collection.call(connection, "count", &[]))?;
//! ```

mod executor;


pub use executor::{RetryExecutor, TransientPredicate};

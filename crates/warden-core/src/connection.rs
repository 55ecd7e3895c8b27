//! Capabilities required from the underlying data-store client library

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::{ConnectionOptions, ObjectRef, Result};

/// A live handle to one or more network connections to the data store
pub trait ConnectionHandle: Send + Sync + fmt::Debug {
    /// Record credentials for a database
    fn add_auth(&self, database: &str, username: &str, password: &str) -> Result<()>;

    /// Authenticate every database recorded with [`ConnectionHandle::add_auth`]
    fn apply_saved_authentication(&self) -> Result<()>;

    /// Get a database-scoped handle
    fn db(&self, database: &str) -> Result<ObjectRef>;

    /// Upcast so remote objects can reach the concrete driver connection
    fn as_any(&self) -> &dyn Any;
}

impl dyn ConnectionHandle {
    /// Downcast to the concrete driver connection
    pub fn downcast_ref<T: ConnectionHandle + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Shared connection handle
pub type ConnectionRef = Arc<dyn ConnectionHandle>;

/// Constructor side of the client library
///
/// Used by the connection manager to build and rebuild handles.
pub trait ClientLibrary: Send + Sync + 'static {
    /// Connect to a single server
    fn new_single_connection(
        &self,
        host: &str,
        port: u16,
        options: &ConnectionOptions,
    ) -> Result<ConnectionRef>;

    /// Connect to an ordered list of replica-set members
    fn new_multi_connection(
        &self,
        hosts: &[(String, u16)],
        options: &ConnectionOptions,
    ) -> Result<ConnectionRef>;
}

impl<T: ClientLibrary> ClientLibrary for Arc<T> {
    fn new_single_connection(
        &self,
        host: &str,
        port: u16,
        options: &ConnectionOptions,
    ) -> Result<ConnectionRef> {
        (**self).new_single_connection(host, port, options)
    }

    fn new_multi_connection(
        &self,
        hosts: &[(String, u16)],
        options: &ConnectionOptions,
    ) -> Result<ConnectionRef> {
        (**self).new_multi_connection(hosts, options)
    }
}

//! Shared state handed to every proxy

use std::sync::Arc;

use warden_connection::{ConnectionManager, RetryExecutor};
use warden_core::{RemoteClass, Result, Value};

use crate::class::ProxyClass;
use crate::registry::ProtectionRegistry;

/// Retry executor and protection registry shared by a family of proxies.
///
/// Cloning is cheap; every proxy holds its own clone.
#[derive(Clone, Debug)]
pub struct ProxyContext {
    executor: RetryExecutor,
    registry: Arc<ProtectionRegistry>,
}

impl ProxyContext {
    pub fn new(executor: RetryExecutor, registry: Arc<ProtectionRegistry>) -> Self {
        Self { executor, registry }
    }

    /// Context with a default executor over `manager` and an empty registry
    pub fn for_manager(manager: Arc<ConnectionManager>) -> Self {
        Self::new(
            RetryExecutor::new(manager),
            Arc::new(ProtectionRegistry::new()),
        )
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    pub fn registry(&self) -> &Arc<ProtectionRegistry> {
        &self.registry
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        self.executor.manager()
    }

    /// Wrap a value according to the registry
    pub fn wrap(&self, value: Value) -> Value {
        self.registry.wrap(value, self)
    }

    /// Database-scoped handle for an alias, wrapped when its type is protected.
    ///
    /// Fetching the handle is retried like any other operation. Unknown
    /// aliases fail without touching the connection.
    pub fn database(&self, alias: &str) -> Result<Value> {
        let name = self.manager().database_name(alias)?;
        self.executor
            .execute(|connection| Ok(self.wrap(Value::Object(connection.db(&name)?))))
    }

    /// Class-level proxy for `T`
    pub fn class<T: RemoteClass>(&self) -> ProxyClass<T> {
        ProxyClass::new(self.clone())
    }

    /// Register `T` as protected and return its class-level proxy
    pub fn protect<T: RemoteClass>(&self) -> ProxyClass<T> {
        self.registry.register::<T>();
        self.class::<T>()
    }
}

//! Remote object traits and runtime type identity
//!
//! A remote object is anything whose operations talk to the data store and
//! may therefore fail with a transient connection error. Proxies own remote
//! objects and are themselves exposed through the [`Guarded`] trait so that
//! a [`Value`] can carry either.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::{ConnectionRef, Result, Value, WardenError};

/// Shared handle to a remote object
pub type ObjectRef = Arc<dyn RemoteObject>;

/// Shared handle to a proxy
pub type GuardedRef = Arc<dyn Guarded>;

/// Named construction parameters for a [`RemoteClass`]
pub type Params = BTreeMap<String, Value>;

/// Runtime identity of a remote type.
///
/// Equality and hashing use the [`TypeId`]; the name is kept for logs and
/// error messages.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for the type `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully qualified type name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// An object whose operations run against the data store.
///
/// `call` receives the connection handle that is live for the current
/// attempt. After a reconnect the next attempt is handed the new handle, so
/// implementations must not cache the handle between calls.
pub trait RemoteObject: Any + Send + Sync + fmt::Debug {
    /// Run a named operation
    fn call(&self, connection: &ConnectionRef, operation: &str, args: &[Value]) -> Result<Value>;

    /// Upcast for downcasting to the concrete type
    fn as_any(&self) -> &dyn Any;

    /// Runtime type used for protection lookups
    fn type_key(&self) -> TypeKey {
        TypeKey::of::<Self>()
    }
}

impl dyn RemoteObject {
    /// Downcast to the concrete remote type
    pub fn downcast_ref<T: RemoteObject>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Check the concrete remote type
    pub fn is<T: RemoteObject>(&self) -> bool {
        self.type_key() == TypeKey::of::<T>()
    }
}

/// Class-level behavior of a remote type: construction and static operations.
pub trait RemoteClass: RemoteObject + Sized {
    /// Construct an instance without arguments
    fn new_default() -> Result<Self>;

    /// Construct an instance from named parameters
    fn new_with(params: &Params) -> Result<Self> {
        let _ = params;
        Err(WardenError::InvalidArgument(format!(
            "{} does not accept construction parameters",
            std::any::type_name::<Self>()
        )))
    }

    /// Run a class-level operation (factories, finders and the like)
    fn class_call(connection: &ConnectionRef, operation: &str, args: &[Value]) -> Result<Value> {
        let _ = (connection, args);
        Err(WardenError::unknown_operation(
            std::any::type_name::<Self>(),
            operation,
        ))
    }
}

/// A proxy: forwards operations to what it owns under retry protection.
pub trait Guarded: Send + Sync + fmt::Debug {
    /// Run a named operation through the retry pipeline
    fn invoke(&self, operation: &str, args: &[Value]) -> Result<Value>;

    /// The owned value, bypassing protection
    fn raw(&self) -> Value;

    /// Marker distinguishing proxies from raw values
    fn is_safe(&self) -> bool {
        true
    }

    /// Upcast for downcasting to the concrete proxy type
    fn as_any(&self) -> &dyn Any;
}

impl dyn Guarded {
    /// Downcast to a concrete proxy type
    pub fn downcast_ref<T: Guarded + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

//! Class-level forwarding for a protected type

use std::fmt;
use std::marker::PhantomData;

use warden_core::{RemoteClass, Result, TypeKey, Value};

use crate::context::ProxyContext;
use crate::proxy::{ConstructArgs, Proxy};

/// Stand-in for the protected type `T` itself.
///
/// Class-level operations such as finders run through the retry pipeline and
/// their results are wrapped, exactly like instance operations.
pub struct ProxyClass<T> {
    context: ProxyContext,
    _marker: PhantomData<fn() -> T>,
}

impl<T: RemoteClass> ProxyClass<T> {
    pub fn new(context: ProxyContext) -> Self {
        Self {
            context,
            _marker: PhantomData,
        }
    }

    /// Run a class-level operation of `T`
    pub fn invoke(&self, operation: &str, args: &[Value]) -> Result<Value> {
        tracing::trace!(target_type = %self.type_key(), operation, "forwarding class operation");
        self.context.executor().execute(|connection| {
            let value = T::class_call(connection, operation, args)?;
            Ok(self.context.wrap(value))
        })
    }

    /// Build a proxy owning an instance of `T`
    pub fn new_proxy(&self, args: ConstructArgs) -> Result<Proxy> {
        Proxy::construct::<T>(args, self.context.clone())
    }

    pub fn type_key(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    pub fn is_safe(&self) -> bool {
        true
    }
}

impl<T> Clone for ProxyClass<T> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ProxyClass<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProxyClass")
            .field(&std::any::type_name::<T>())
            .finish()
    }
}

//! Proxy owning a single protected object

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use warden_core::{
    Guarded, ObjectRef, Params, RemoteClass, RemoteObject, Result, TypeKey, Value, WardenError,
};

use crate::context::ProxyContext;

/// How [`Proxy::construct`] obtains the object it will own
#[derive(Debug, Clone, Default)]
pub enum ConstructArgs {
    /// Build a fresh instance with [`RemoteClass::new_default`]
    #[default]
    Default,
    /// Take ownership of an existing instance
    Adopt(ObjectRef),
    /// Build an instance with [`RemoteClass::new_with`]
    Params(Params),
}

impl From<ObjectRef> for ConstructArgs {
    fn from(object: ObjectRef) -> Self {
        Self::Adopt(object)
    }
}

impl From<Params> for ConstructArgs {
    fn from(params: Params) -> Self {
        Self::Params(params)
    }
}

/// Forwards every operation to the object it owns, retrying transient
/// failures and wrapping protected results.
///
/// ```ignore
/// let account = Proxy::construct::<Account>(ConstructArgs::Default, context)?;
/// let owner = account.invoke("owner", &[])?; // a proxy again if owners are protected
/// ```
#[derive(Clone)]
pub struct Proxy {
    object: ObjectRef,
    context: ProxyContext,
}

impl Proxy {
    /// Adopt an object without checking its type
    pub fn new(object: ObjectRef, context: ProxyContext) -> Self {
        Self { object, context }
    }

    /// Build a proxy owning an instance of `T`
    pub fn construct<T: RemoteClass>(args: ConstructArgs, context: ProxyContext) -> Result<Self> {
        let object: ObjectRef = match args {
            ConstructArgs::Default => Arc::new(T::new_default()?),
            ConstructArgs::Params(params) if params.is_empty() => Arc::new(T::new_default()?),
            ConstructArgs::Params(params) => Arc::new(T::new_with(&params)?),
            ConstructArgs::Adopt(object) => {
                if !object.is::<T>() {
                    return Err(WardenError::InvalidArgument(format!(
                        "Expected an instance of {}, got {}",
                        TypeKey::of::<T>(),
                        object.type_key()
                    )));
                }
                object
            }
        };
        Ok(Self::new(object, context))
    }

    /// Run an operation on the owned object
    pub fn invoke(&self, operation: &str, args: &[Value]) -> Result<Value> {
        tracing::trace!(target_type = %self.object.type_key(), operation, "forwarding operation");
        self.context.executor().execute(|connection| {
            let value = self.object.call(connection, operation, args)?;
            Ok(self.context.wrap(value))
        })
    }

    /// The owned object, bypassing protection
    pub fn unwrap(&self) -> ObjectRef {
        self.object.clone()
    }

    /// Borrow the owned object as its concrete type
    pub fn downcast_ref<T: RemoteObject>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    pub fn type_key(&self) -> TypeKey {
        self.object.type_key()
    }

    pub fn is_safe(&self) -> bool {
        true
    }

    pub fn context(&self) -> &ProxyContext {
        &self.context
    }
}

impl Guarded for Proxy {
    fn invoke(&self, operation: &str, args: &[Value]) -> Result<Value> {
        Proxy::invoke(self, operation, args)
    }

    fn raw(&self) -> Value {
        Value::Object(self.unwrap())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Proxy").field(&self.object).finish()
    }
}

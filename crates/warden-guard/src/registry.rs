//! Registry of protected remote types

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use warden_core::{GuardedRef, ObjectRef, RemoteObject, TypeKey, Value};

use crate::context::ProxyContext;
use crate::proxy::Proxy;
use crate::sequence::SequenceProxy;

/// Builds a specialized proxy around a protected object
pub type ProxyConstructor = Arc<dyn Fn(ObjectRef, ProxyContext) -> GuardedRef + Send + Sync>;

/// Builds a specialized proxy around a sequence of protected objects
pub type SequenceConstructor = Arc<dyn Fn(Vec<Value>, ProxyContext) -> GuardedRef + Send + Sync>;

/// Set of protected types and the proxies that wrap them.
///
/// Registration only ever grows the set; registering a type again
/// replaces its constructor. Types registered without a
/// constructor are wrapped in a plain [`Proxy`]; sequences without a
/// sequence constructor in a plain [`SequenceProxy`].
#[derive(Default)]
pub struct ProtectionRegistry {
    /// Protected types, with an optional specialized constructor
    scalars: RwLock<HashMap<TypeKey, Option<ProxyConstructor>>>,
    /// Sequence constructors keyed by element type
    sequences: RwLock<HashMap<TypeKey, SequenceConstructor>>,
}

impl ProtectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Protect `T` with the default proxy
    pub fn register<T: RemoteObject>(&self) {
        self.register_key(TypeKey::of::<T>());
    }

    /// Protect a type by key with the default proxy.
    ///
    /// Replaces any specialized constructor registered earlier.
    pub fn register_key(&self, key: TypeKey) {
        tracing::debug!(protected_type = %key, "registering protected type");
        self.scalars.write().insert(key, None);
    }

    /// Protect `T` with a specialized proxy constructor
    pub fn register_with<T, F>(&self, constructor: F)
    where
        T: RemoteObject,
        F: Fn(ObjectRef, ProxyContext) -> GuardedRef + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        tracing::debug!(protected_type = %key, "registering protected type with constructor");
        self.scalars.write().insert(key, Some(Arc::new(constructor)));
    }

    /// Use a specialized proxy for sequences whose first element is a `T`.
    ///
    /// This does not protect `T` itself; sequences are only wrapped while
    /// `T` is protected.
    pub fn register_sequence<T, F>(&self, constructor: F)
    where
        T: RemoteObject,
        F: Fn(Vec<Value>, ProxyContext) -> GuardedRef + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        tracing::debug!(element_type = %key, "registering sequence constructor");
        self.sequences.write().insert(key, Arc::new(constructor));
    }

    pub fn is_protected(&self, key: TypeKey) -> bool {
        self.scalars.read().contains_key(&key)
    }

    pub fn is_protected_type<T: RemoteObject>(&self) -> bool {
        self.is_protected(TypeKey::of::<T>())
    }

    /// All protected types, in no particular order
    pub fn protected_types(&self) -> Vec<TypeKey> {
        self.scalars.read().keys().copied().collect()
    }

    /// Wrap a value in a proxy when its type is protected.
    ///
    /// Sequences are judged by their first element only; empty sequences and
    /// everything that is not a remote object come back unchanged.
    pub fn wrap(&self, value: Value, context: &ProxyContext) -> Value {
        match value {
            Value::Object(object) => {
                let key = object.type_key();
                let constructor = match self.scalars.read().get(&key) {
                    None => return Value::Object(object),
                    Some(constructor) => constructor.clone(),
                };
                tracing::trace!(protected_type = %key, "wrapping object");
                let guarded: GuardedRef = match constructor {
                    Some(constructor) => constructor(object, context.clone()),
                    None => Arc::new(Proxy::new(object, context.clone())),
                };
                Value::Guarded(guarded)
            }
            Value::Array(items) => {
                let Some(key) = items.first().and_then(Value::type_key) else {
                    return Value::Array(items);
                };
                if !self.is_protected(key) {
                    return Value::Array(items);
                }
                tracing::trace!(element_type = %key, len = items.len(), "wrapping sequence");
                let constructor = self.sequences.read().get(&key).cloned();
                let guarded: GuardedRef = match constructor {
                    Some(constructor) => constructor(items, context.clone()),
                    None => Arc::new(SequenceProxy::new(items, context.clone())),
                };
                Value::Guarded(guarded)
            }
            other => other,
        }
    }
}

impl fmt::Debug for ProtectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectionRegistry")
            .field("protected_types", &self.protected_types())
            .field("sequence_types", &self.sequences.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

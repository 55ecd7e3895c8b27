//! Proxy owning a sequence of protected objects

use std::any::Any;
use std::fmt;

use warden_core::{Guarded, Result, Value, WardenError};

use crate::context::ProxyContext;

/// Sequence whose elements come back wrapped.
///
/// The sequence itself lives in memory, so its operations never touch the
/// connection. Operations on the elements go through their own proxies.
#[derive(Clone)]
pub struct SequenceProxy {
    items: Vec<Value>,
    context: ProxyContext,
}

impl SequenceProxy {
    pub fn new(items: Vec<Value>, context: ProxyContext) -> Self {
        Self { items, context }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Element at `index`, wrapped
    pub fn get(&self, index: usize) -> Option<Value> {
        self.items
            .get(index)
            .map(|item| self.context.wrap(item.clone()))
    }

    pub fn first(&self) -> Option<Value> {
        self.get(0)
    }

    pub fn last(&self) -> Option<Value> {
        self.len().checked_sub(1).and_then(|index| self.get(index))
    }

    /// Wrapped elements in order
    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        self.items
            .iter()
            .map(|item| self.context.wrap(item.clone()))
    }

    /// Plain elements, as originally returned
    pub fn to_vec(&self) -> Vec<Value> {
        self.items.clone()
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.items
    }

    /// Run a sequence operation.
    ///
    /// Supported: `len`/`size`/`length`, `is_empty`, `first`, `last`,
    /// `get`/`[]` with an integer index (negative counts from the end) and
    /// `to_a`. Missing elements come back as [`Value::Null`].
    pub fn invoke(&self, operation: &str, args: &[Value]) -> Result<Value> {
        match operation {
            "len" | "size" | "length" => Ok(Value::Int64(self.len() as i64)),
            "is_empty" => Ok(Value::Bool(self.is_empty())),
            "first" => Ok(self.first().unwrap_or(Value::Null)),
            "last" => Ok(self.last().unwrap_or(Value::Null)),
            "get" | "[]" => {
                let index = args.first().and_then(Value::as_i64).ok_or_else(|| {
                    WardenError::InvalidArgument(format!(
                        "`{}` expects an integer index",
                        operation
                    ))
                })?;
                Ok(self
                    .resolve_index(index)
                    .and_then(|index| self.get(index))
                    .unwrap_or(Value::Null))
            }
            "to_a" => Ok(Value::Array(self.to_vec())),
            _ => Err(WardenError::unknown_operation("SequenceProxy", operation)),
        }
    }

    fn resolve_index(&self, index: i64) -> Option<usize> {
        if index < 0 {
            self.len().checked_sub(usize::try_from(index.unsigned_abs()).ok()?)
        } else {
            usize::try_from(index).ok()
        }
    }
}

impl Guarded for SequenceProxy {
    fn invoke(&self, operation: &str, args: &[Value]) -> Result<Value> {
        SequenceProxy::invoke(self, operation, args)
    }

    fn raw(&self) -> Value {
        Value::Array(self.to_vec())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for SequenceProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceProxy")
            .field("len", &self.items.len())
            .finish_non_exhaustive()
    }
}

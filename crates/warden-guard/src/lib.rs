//! Warden Guard - Transparent retry proxies
//!
//! A [`ProtectionRegistry`] records which remote types are protected. Results
//! of proxied operations pass through [`ProtectionRegistry::wrap`], so a
//! protected object never reaches the caller unwrapped:
//!
//! - [`Proxy`] owns one protected object and forwards operations to it
//! - [`SequenceProxy`] owns a sequence whose first element is protected
//! - [`ProxyClass`] forwards class-level operations of a protected type
//!
//! Every forwarded operation runs through a
//! [`RetryExecutor`](warden_connection::RetryExecutor), so transient
//! connection failures reconnect and retry.

mod class;
mod context;
mod proxy;
mod registry;
mod sequence;

#[cfg(test)]
mod test_support;

pub use class::ProxyClass;
pub use context::ProxyContext;
pub use proxy::{ConstructArgs, Proxy};
pub use registry::{ProtectionRegistry, ProxyConstructor, SequenceConstructor};
pub use sequence::SequenceProxy;

//! Warden Core - Core abstractions for transparent retry proxies
//!
//! This crate provides the fundamental traits and types that the other
//! Warden crates depend on. It defines:
//!
//! - `WardenError` - The error taxonomy, including the transient `ConnectionFailure`
//! - `Value` - Dynamic values passed to and returned from remote operations
//! - `RemoteObject` / `RemoteClass` - Objects whose operations hit the data store
//! - `Guarded` - The proxy interface
//! - `ClientLibrary` / `ConnectionHandle` - What the data-store client must provide
//! - `HostDescriptor` - Parsed host URLs

mod connection;
mod error;
mod host;
mod object;
mod options;
mod types;

pub use connection::*;
pub use error::*;
pub use host::*;
pub use object::*;
pub use options::*;
pub use types::*;

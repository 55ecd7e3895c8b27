//! Host descriptors and host URL parsing
//!
//! Host URLs have the form `scheme://[user[:password]@]host[:port]`. The
//! scheme is not interpreted; a bare `host[:port]` is accepted as well.

use std::fmt;

use serde::Serialize;
use url::{Host, Url};

use crate::{Result, WardenError};

/// Port used when a host URL does not name one
pub const DEFAULT_PORT: u16 = 27017;

const DEFAULT_SCHEME: &str = "mongodb";

/// One server endpoint, with optional credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostDescriptor {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl HostDescriptor {
    /// Create a descriptor without credentials
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
        }
    }

    /// Attach credentials
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Username and password, if a username was given.
    ///
    /// A username without a password authenticates with an empty password.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.username
            .as_deref()
            .map(|username| (username, self.password.as_deref().unwrap_or_default()))
    }

    /// The `(host, port)` pair handed to the client library
    pub fn address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

/// Credentials are never printed.
impl fmt::Display for HostDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parse a host URL into a [`HostDescriptor`]
pub fn parse_host_url(input: &str) -> Result<HostDescriptor> {
    let trimmed = input.trim();
    let normalized = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("{DEFAULT_SCHEME}://{trimmed}")
    };

    let url = Url::parse(&normalized).map_err(|e| {
        WardenError::Configuration(format!("Invalid host URL `{}`: {}", input, e))
    })?;

    let host = match url.host() {
        Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
        Some(Host::Ipv4(address)) => address.to_string(),
        Some(Host::Ipv6(address)) => address.to_string(),
        _ => {
            return Err(WardenError::Configuration(format!(
                "Host URL `{}` names no host",
                input
            )));
        }
    };

    let username = Some(url.username())
        .filter(|username| !username.is_empty())
        .map(decode_component)
        .transpose()?;
    let password = url
        .password()
        .map(decode_component)
        .transpose()?;

    let descriptor = HostDescriptor {
        host,
        port: url.port().unwrap_or(DEFAULT_PORT),
        username,
        password,
    };
    tracing::trace!(host = %descriptor, authenticated = descriptor.username.is_some(), "parsed host URL");
    Ok(descriptor)
}

/// Credentials arrive percent-encoded; `@`, `:` and `/` can only be written that way.
fn decode_component(encoded: &str) -> Result<String> {
    urlencoding::decode(encoded)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| WardenError::Configuration(format!("Host URL has malformed credentials: {}", e)))
}

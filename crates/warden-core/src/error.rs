//! Error types for Warden

use thiserror::Error;

/// Core error type for Warden operations
#[derive(Error, Debug)]
pub enum WardenError {
    /// Transient loss of connectivity. The only kind retried by default.
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Operation error: {0}")]
    Operation(String),

    #[error("Unknown operation `{operation}` on {type_name}")]
    UnknownOperation {
        type_name: String,
        operation: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl WardenError {
    /// Shorthand for an [`WardenError::UnknownOperation`] error
    pub fn unknown_operation(type_name: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::UnknownOperation {
            type_name: type_name.into(),
            operation: operation.into(),
        }
    }

    /// Whether the error signals transient connectivity loss.
    ///
    /// This is the default retry predicate used by the retry executor.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailure(_))
    }
}

/// Result type alias for Warden operations
pub type Result<T> = std::result::Result<T, WardenError>;

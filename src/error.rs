//! Error types for the tiered cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the tiered cache
#[derive(Error, Debug)]
pub enum Error {
    /// No tier holds the key
    #[error("key not found: {key}")]
    NotFound { key: String },

    /// Connection, protocol or timeout failure talking to the remote tier
    #[error("remote cache unavailable: {0}")]
    RemoteUnavailable(String),

    /// Malformed or missing configuration
    #[error("invalid cache configuration: {0}")]
    ConfigurationInvalid(String),

    /// Duration parse error
    #[error("failed to parse duration: {0}")]
    DurationParse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML configuration error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Prometheus registry error
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl Error {
    /// Build a `NotFound` for the given key
    pub fn not_found(key: impl Into<String>) -> Self {
        Error::NotFound { key: key.into() }
    }

    /// True if this error is a plain miss rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::RemoteUnavailable(err.to_string())
    }
}

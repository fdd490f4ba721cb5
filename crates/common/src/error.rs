//! Error types for runwatch

use thiserror::Error;

/// Result type alias using the runwatch [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised outside the polling path (configuration, I/O, encoding)
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlDecode(#[from] toml::de::Error),

    #[error("Config encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure of a single status fetch.
///
/// Every variant is recoverable: pollers record it against the job and keep
/// polling on schedule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Execution not found: {0}")]
    NotFound(String),

    #[error("Unparseable status payload: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        FetchError::Transport(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        FetchError::Decode(message.into())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Decode(e.to_string())
    }
}

//! Error types for the application.

use thiserror::Error;

/// Configuration-related errors.
///
/// Every variant is fatal: the bridge refuses to start before any
/// connection is attempted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },

    #[error("Missing configuration field {field}")]
    MissingField { field: String },

    #[error("Invalid channel mapping: {message}")]
    InvalidChannelMapping { message: String },
}

/// IRC session errors.
#[derive(Debug, Error)]
pub enum IrcError {
    #[error("IRC client error: {0}")]
    Client(#[from] ::irc::error::Error),

    #[error("Gave up reconnecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

/// Result type alias for IRC session operations.
pub type IrcResult<T> = std::result::Result<T, IrcError>;

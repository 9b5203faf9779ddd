//! Error types for calfix.

use std::num::ParseIntError;

use thiserror::Error;

/// Errors raised while reading configuration at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Required environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("PORT must be a number between 0 and 65535, got '{value}': {source}")]
    InvalidPort {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Errors raised while rewriting a calendar feed.
#[derive(Error, Debug)]
pub enum IcsError {
    #[error("ICS parse error: {0}")]
    Parse(String),

    #[error("ICS serialization error: {0}")]
    Serialize(String),
}

/// Result type alias for ICS operations.
pub type IcsResult<T> = Result<T, IcsError>;

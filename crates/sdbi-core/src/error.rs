//! Error types for sdbi-engage operations.

use thiserror::Error;

/// Result type alias for sdbi-engage operations.
pub type SdbiResult<T> = Result<T, SdbiError>;

/// Main error type for all sdbi-engage operations.
#[derive(Error, Debug)]
pub enum SdbiError {
    /// Network request failed before a response was received.
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The portal answered with a non-success status or payload.
    #[error("API error: {message}")]
    Api { message: String },

    /// Response body could not be decoded.
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        /// The field that failed validation, when known.
        field: Option<String>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SdbiError {
    /// Create a network error with a source.
    pub fn network(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an API error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a validation error for a specific field.
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

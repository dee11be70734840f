//! Error types and handling for Pricewatch
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Pricewatch operations
pub type Result<T> = std::result::Result<T, PricewatchError>;

/// Main error type for Pricewatch
#[derive(Debug, Error)]
pub enum PricewatchError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Network-related errors (connect, TLS, body read)
    #[error("Network error: {message}")]
    Network { message: String },

    /// Price API answered with a non-success status
    #[error("API error: {message}")]
    Api { message: String },

    /// Response body did not have the expected shape or value
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl PricewatchError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        PricewatchError::Config {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        PricewatchError::Web {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        PricewatchError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        PricewatchError::Io {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        PricewatchError::Network {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        PricewatchError::Api {
            message: message.into(),
        }
    }

    /// Create a new parse error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        PricewatchError::Parse {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        PricewatchError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        PricewatchError::Generic {
            message: message.into(),
        }
    }

    /// Short category label used in logs and the status API
    pub fn kind(&self) -> &'static str {
        match self {
            PricewatchError::Config { .. } => "config",
            PricewatchError::Web { .. } => "web",
            PricewatchError::Serialization { .. } => "serialization",
            PricewatchError::Io { .. } => "io",
            PricewatchError::Network { .. } => "network",
            PricewatchError::Api { .. } => "api",
            PricewatchError::Parse { .. } => "parse",
            PricewatchError::Validation { .. } => "validation",
            PricewatchError::Timeout { .. } => "timeout",
            PricewatchError::Generic { .. } => "generic",
        }
    }
}

impl From<std::io::Error> for PricewatchError {
    fn from(err: std::io::Error) -> Self {
        PricewatchError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for PricewatchError {
    fn from(err: serde_yaml::Error) -> Self {
        PricewatchError::Serialization {
            message: err.to_string(),
        }
    }
}

// JSON and XML bodies come from the price APIs, so a decode failure is a
// malformed response rather than a local serialization problem.
impl From<serde_json::Error> for PricewatchError {
    fn from(err: serde_json::Error) -> Self {
        PricewatchError::parse(err.to_string())
    }
}

impl From<quick_xml::DeError> for PricewatchError {
    fn from(err: quick_xml::DeError) -> Self {
        PricewatchError::parse(err.to_string())
    }
}

impl From<reqwest::Error> for PricewatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PricewatchError::timeout(err.to_string())
        } else {
            PricewatchError::network(err.to_string())
        }
    }
}

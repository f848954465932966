//! Error types for the Taskboard client

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while talking to the Taskboard backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Credentials or registration rejected by the backend
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// A local precondition failed before any request was sent
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport failure, no response was received
    #[error("Network error: {0}")]
    Network(String),

    /// The backend rejected the credential (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The addressed resource does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-2xx response
    #[error("HTTP error {status}: {message}")]
    Request { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Persisted token could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create an authentication error
    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Map a non-success status and its body text onto the taxonomy
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized(message),
            StatusCode::NOT_FOUND => Self::NotFound(message),
            _ => Self::Request {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// HTTP status carried by this error, if it came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(401),
            Self::NotFound(_) => Some(404),
            Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the backend rejected the held credential
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status, err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type for client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;

//! Error types for the stream widget.
//!
//! [`TransportError`] drives reconnection. [`TransformError`] only changes what
//! is displayed. [`ConfigError`] rejects a configuration change before it takes
//! effect.

use std::time::Duration;

use thiserror::Error;

/// Result type used by transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// A connection could not be established or was dropped.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The stream URL is empty or not an absolute http(s) URL.
    #[error("Invalid stream URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// HTTP request or body read errors.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("Unexpected SSE status: {status}")]
    InvalidStatus { status: http::StatusCode },

    /// The server answered with something other than `text/event-stream`.
    #[error("Unexpected SSE content type: {content_type}")]
    InvalidContentType { content_type: String },

    /// The event stream could not be decoded.
    #[error("SSE decode error: {message}")]
    Decode { message: String },

    /// The server closed the stream.
    #[error("SSE stream ended")]
    StreamEnded,

    /// Connection attempt did not complete in time.
    #[error("Connection timed out after {duration:?}")]
    Timeout { duration: Duration },
}

impl TransportError {
    /// Create an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid status error.
    pub fn invalid_status(status: http::StatusCode) -> Self {
        Self::InvalidStatus { status }
    }

    /// Create an invalid content type error.
    pub fn invalid_content_type(content_type: impl Into<String>) -> Self {
        Self::InvalidContentType {
            content_type: content_type.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }
}

/// The payload transform hook rejected a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// The hook returned an error.
    #[error("Transform failed: {message}")]
    Failed { message: String },

    /// The hook panicked while processing the message.
    #[error("Transform panicked: {message}")]
    Panicked { message: String },
}

impl TransformError {
    /// Create a transform failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// A configuration change was rejected; the previous configuration stays in
/// effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid stream URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid {field}: {message}")]
    OutOfRange {
        field: &'static str,
        message: String,
    },

    #[error("Unknown attribute: {name}")]
    UnknownAttribute { name: String },

    #[error("Invalid value {value:?} for attribute {name}")]
    InvalidValue { name: String, value: String },
}

impl ConfigError {
    pub(crate) fn out_of_range(field: &'static str, message: impl Into<String>) -> Self {
        Self::OutOfRange {
            field,
            message: message.into(),
        }
    }
}

/// Crate-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The widget driver has already shut down.
    #[error("Widget has been detached")]
    Closed,
}

impl Error {
    /// Returns `true` if this error came from the transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` if this error came from the transform hook.
    pub fn is_transform(&self) -> bool {
        matches!(self, Self::Transform(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = TransportError::invalid_url("", "URL cannot be empty");
        assert!(matches!(err, TransportError::InvalidUrl { .. }));

        let err = TransportError::timeout(Duration::from_secs(5));
        assert!(matches!(err, TransportError::Timeout { .. }));

        let err = TransportError::invalid_status(http::StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "Unexpected SSE status: 403 Forbidden");
    }

    #[test]
    fn test_umbrella_classification() {
        let err: Error = TransportError::StreamEnded.into();
        assert!(err.is_transport());
        assert!(!err.is_transform());

        let err: Error = TransformError::failed("bad json").into();
        assert!(err.is_transform());
        assert_eq!(err.to_string(), "Transform failed: bad json");
    }
}

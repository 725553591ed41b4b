//! Error handling for the board event stream client.

use std::time::Duration;

use thiserror::Error;

/// The main result type used throughout the crate.
pub type StreamResult<T> = Result<T, StreamError>;

/// Error type covering every failure mode of the stream client.
#[derive(Error, Debug)]
pub enum StreamError {
    /// HTTP request errors from the underlying client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Envelope serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors.
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong with the configuration.
        message: String,
    },

    /// Connect attempt timed out.
    #[error("Connect timed out after {duration:?}")]
    Timeout {
        /// The connect timeout that elapsed.
        duration: Duration,
    },

    /// The stream endpoint answered with a non-success status code.
    #[error("Stream endpoint returned status {status}")]
    InvalidStatus {
        /// The HTTP status code received.
        status: http::StatusCode,
    },

    /// The stream endpoint did not answer with `text/event-stream`.
    #[error("Stream endpoint returned content-type {content_type:?}, expected text/event-stream")]
    InvalidContentType {
        /// The Content-Type header value received.
        content_type: String,
    },

    /// The server closed the event stream.
    #[error("Server closed the event stream")]
    StreamEnded,

    /// SSE wire-format errors from the parser.
    #[error("SSE protocol error: {message}")]
    Sse {
        /// Description of the protocol violation.
        message: String,
    },

    /// The reconnection budget is exhausted. Terminal until the consumer
    /// re-enables the stream.
    #[error("failed to connect after maximum retries ({attempts} attempts)")]
    RetriesExhausted {
        /// How many reconnect attempts were made.
        attempts: u32,
    },

    /// A handle was used after the background task shut down.
    #[error("Connection closed: {reason}")]
    ConnectionClosed {
        /// Why the connection is gone.
        reason: String,
    },
}

impl StreamError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Create an invalid-status error.
    pub fn invalid_status(status: http::StatusCode) -> Self {
        Self::InvalidStatus { status }
    }

    /// Create an invalid-content-type error.
    pub fn invalid_content_type(content_type: impl Into<String>) -> Self {
        Self::InvalidContentType {
            content_type: content_type.into(),
        }
    }

    /// Create an SSE protocol error.
    pub fn sse(message: impl Into<String>) -> Self {
        Self::Sse {
            message: message.into(),
        }
    }

    /// Create a connection-closed error.
    pub fn connection_closed(reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            reason: reason.into(),
        }
    }
}

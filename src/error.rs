//! Error types for edrelay.

use thiserror::Error;

/// Main error type for all relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// I/O error during socket or descriptor operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The port environment variable is missing.
    #[error("{0} is not set")]
    PortUnset(&'static str),

    /// The port environment variable does not hold a TCP port number.
    #[error("invalid {0}: {1:?}")]
    PortInvalid(&'static str, String),

    /// The sole connection of a client closed before the expected
    /// response arrived.
    #[error("connection closed: {0}")]
    ConnectionClosed(std::io::Error),

    /// The editor connection of a server-mode broker closed. There is
    /// nothing left to route to, so the broker must exit.
    #[error("editor connection lost: {0}")]
    EditorLost(std::io::Error),
}

/// Result type alias using RelayError.
pub type Result<T> = std::result::Result<T, RelayError>;

//! Hub error types

use thiserror::Error;

/// Errors from the fallible edges of the hub.
///
/// Event handlers themselves are infallible: malformed input is dropped and
/// per-connection delivery failures are isolated, so nothing in the steady
/// state can reach this type.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Hub is not running")]
    HubClosed,
}

/// Result type for hub operations
pub type HubResult<T> = Result<T, HubError>;

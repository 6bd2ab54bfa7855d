//! Error types for the signaling relay

use thiserror::Error;

/// Result type alias for signaling relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the signaling relay
#[derive(Debug, Error)]
pub enum Error {
    /// Listener or socket I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket protocol failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Envelope encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session table exhausted; fatal to the connection, never the process
    #[error("session table full ({0} live sessions)")]
    SessionLimit(usize),
}

//! Error types for the streaming client

use thiserror::Error;

/// Streaming client errors
///
/// `Clone` is derived so that a single pending connection attempt can hand
/// the same failure to every caller waiting on it.
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    #[error("transport connection error: {0}")]
    Connection(String),

    #[error("transport message error: {0}")]
    Message(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("not connected")]
    NotConnected,

    #[error("failed to parse frame: {0}")]
    Parse(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("subscription error: {0}")]
    Subscription(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for StreamError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        StreamError::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;

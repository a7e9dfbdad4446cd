use std::time::Duration;

use botdeck_protocol::ProtocolError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Transport-level failures. Application-level rejections
/// (`status: error|warning`) are not errors; they travel in envelopes.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("websocket error: {0}")]
    WebSocket(String),

    #[error("push channel is not connected")]
    NotConnected,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

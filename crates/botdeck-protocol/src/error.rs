use thiserror::Error;

/// Errors raised while decoding wire data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty packet")]
    EmptyPacket,

    #[error("unknown {layer} packet type '{found}'")]
    UnknownPacketType { layer: &'static str, found: char },

    #[error("binary socket.io packets are not supported")]
    UnsupportedBinary,

    #[error("malformed ack id: {0}")]
    MalformedAckId(String),

    #[error("invalid payload: {0}")]
    Payload(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

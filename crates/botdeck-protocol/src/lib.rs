//! botdeck protocol - wire types and packet codec
//!
//! Describes the JSON shapes exchanged with the bot manager backend (REST
//! bodies and event envelopes) and the Engine.IO v4 / Socket.IO v5 text
//! framing used by its push channels.

pub mod error;
pub mod socketio;
pub mod types;

pub use error::*;
pub use socketio::{
    EnginePacket, Handshake, PacketKind, SocketPacket, API_NAMESPACE, DEFAULT_NAMESPACE,
    SERVER_NAMESPACE, SOCKET_IO_PATH,
};
pub use types::*;

//! Engine.IO v4 / Socket.IO v5 text framing.
//!
//! Only the text subset is implemented: one WebSocket frame carries one
//! Engine.IO packet, and Engine.IO `message` packets carry one Socket.IO
//! packet. Binary attachments are rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

/// HTTP path the backend mounts its Socket.IO server on.
pub const SOCKET_IO_PATH: &str = "/ws/socket.io/";
pub const DEFAULT_NAMESPACE: &str = "/";
pub const SERVER_NAMESPACE: &str = "/server";
pub const API_NAMESPACE: &str = "/api";

/// Payload of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds.
    pub ping_interval: u64,
    /// Milliseconds.
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: u64,
}

/// One Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(ProtocolError::EmptyPacket)?;
        let body = chars.as_str();
        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(body)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(body.to_string())),
            '3' => Ok(EnginePacket::Pong(body.to_string())),
            '4' => Ok(EnginePacket::Message(body.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(ProtocolError::UnknownPacketType {
                layer: "engine.io",
                found: other,
            }),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(handshake) => {
                format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
            }
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(body) => format!("2{body}"),
            EnginePacket::Pong(body) => format!("3{body}"),
            EnginePacket::Message(body) => format!("4{body}"),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

/// Socket.IO packet type digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
}

impl PacketKind {
    fn digit(&self) -> char {
        match self {
            PacketKind::Connect => '0',
            PacketKind::Disconnect => '1',
            PacketKind::Event => '2',
            PacketKind::Ack => '3',
            PacketKind::ConnectError => '4',
        }
    }

    fn from_digit(c: char) -> Result<Self, ProtocolError> {
        match c {
            '0' => Ok(PacketKind::Connect),
            '1' => Ok(PacketKind::Disconnect),
            '2' => Ok(PacketKind::Event),
            '3' => Ok(PacketKind::Ack),
            '4' => Ok(PacketKind::ConnectError),
            '5' | '6' => Err(ProtocolError::UnsupportedBinary),
            other => Err(ProtocolError::UnknownPacketType {
                layer: "socket.io",
                found: other,
            }),
        }
    }
}

/// One Socket.IO packet addressed to a namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    pub kind: PacketKind,
    pub namespace: String,
    pub ack_id: Option<u64>,
    pub payload: Option<Value>,
}

impl SocketPacket {
    pub fn connect(namespace: &str) -> Self {
        Self {
            kind: PacketKind::Connect,
            namespace: namespace.to_string(),
            ack_id: None,
            payload: None,
        }
    }

    pub fn disconnect(namespace: &str) -> Self {
        Self {
            kind: PacketKind::Disconnect,
            namespace: namespace.to_string(),
            ack_id: None,
            payload: None,
        }
    }

    /// `["<name>", <data>]` event on `namespace`.
    pub fn event(namespace: &str, name: &str, data: Value) -> Self {
        Self {
            kind: PacketKind::Event,
            namespace: namespace.to_string(),
            ack_id: None,
            payload: Some(Value::Array(vec![Value::String(name.to_string()), data])),
        }
    }

    /// Event name and first argument, for `Event` packets.
    pub fn event_parts(&self) -> Option<(&str, Option<&Value>)> {
        if self.kind != PacketKind::Event {
            return None;
        }
        let items = self.payload.as_ref()?.as_array()?;
        let name = items.first()?.as_str()?;
        Some((name, items.get(1)))
    }

    pub fn decode(body: &str) -> Result<Self, ProtocolError> {
        let mut chars = body.chars();
        let kind = PacketKind::from_digit(chars.next().ok_or(ProtocolError::EmptyPacket)?)?;
        let mut rest = chars.as_str();

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(idx) => {
                    let ns = &rest[..idx];
                    rest = &rest[idx + 1..];
                    ns.to_string()
                }
                None => {
                    let ns = rest.to_string();
                    rest = "";
                    ns
                }
            }
        } else {
            DEFAULT_NAMESPACE.to_string()
        };

        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        let ack_id = if digits > 0 {
            let raw = &rest[..digits];
            rest = &rest[digits..];
            Some(
                raw.parse::<u64>()
                    .map_err(|_| ProtocolError::MalformedAckId(raw.to_string()))?,
            )
        } else {
            None
        };

        let payload = if rest.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        Ok(Self {
            kind,
            namespace,
            ack_id,
            payload,
        })
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.digit());
        if self.namespace != DEFAULT_NAMESPACE {
            out.push_str(&self.namespace);
            out.push(',');
        }
        if let Some(id) = self.ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(payload) = &self.payload {
            out.push_str(&payload.to_string());
        }
        out
    }

    /// Wrap in an Engine.IO `message` packet, ready to send as one frame.
    pub fn to_frame(&self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

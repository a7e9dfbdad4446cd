use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use botdeck_protocol::{AppAction, Application, Envelope, FleetAction, LogEntry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// Which transport implementation drives the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Push,
    Poll,
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "push" | "ws" | "websocket" => Ok(TransportMode::Push),
            "poll" | "polling" | "rest" => Ok(TransportMode::Poll),
            other => Err(format!("unknown transport mode '{other}' (expected push or poll)")),
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Push => f.write_str("push"),
            TransportMode::Poll => f.write_str("poll"),
        }
    }
}

/// One event received on a push namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    /// `/server` or `/api`.
    pub namespace: String,
    pub event: String,
    pub envelope: Envelope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Everything a transport learns, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Authoritative full list.
    Snapshot(Vec<Application>),
    /// New runtime log entries (polling).
    Logs(Vec<LogEntry>),
    /// Event from a push namespace.
    Channel(ChannelMessage),
    /// Outcome of a configuration submit (polling; push delivers `app_edit`).
    EditResult(Envelope),
    Connection {
        state: ConnectionState,
        detail: String,
    },
    /// A background operation (poller, reader) failed.
    Failure { context: String, error: String },
}

/// The dashboard's only view of the backend.
#[async_trait]
pub trait Transport: Send + Sync {
    fn mode(&self) -> TransportMode;

    /// Fetch the full list; the result arrives as [`TransportEvent::Snapshot`].
    async fn refresh_all(&self) -> Result<()>;

    async fn perform_action(&self, app_id: &str, action: AppAction) -> Result<()>;

    /// Submit a new configuration; the verdict arrives as an event.
    async fn submit_config(&self, app_id: &str, config: Value) -> Result<()>;

    async fn fetch_app(&self, app_id: &str) -> Result<Option<Application>>;

    async fn fleet(&self, action: FleetAction) -> Result<Envelope>;
}

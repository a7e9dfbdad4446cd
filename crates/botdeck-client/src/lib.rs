//! botdeck client - transports to the bot manager backend
//!
//! Two interchangeable implementations of [`Transport`]:
//! - [`PollingTransport`]: plain REST calls with refresh-after-write and a
//!   fixed-interval poller
//! - [`PushTransport`]: a Socket.IO connection multiplexing the `/server`
//!   and `/api` namespaces, with REST for list/app/fleet calls
//!
//! Both report everything they learn through one
//! `mpsc::UnboundedReceiver<TransportEvent>` handed out at construction.

pub mod cursor;
pub mod error;
pub mod polling;
pub mod push;
pub mod rest;
pub mod transport;

pub use cursor::LogCursor;
pub use error::{ClientError, Result};
pub use polling::PollingTransport;
pub use push::PushTransport;
pub use rest::RestClient;
pub use transport::{ChannelMessage, ConnectionState, Transport, TransportEvent, TransportMode};

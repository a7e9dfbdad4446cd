//! Socket.IO push transport.
//!
//! One WebSocket carries both namespaces. The reader task answers pings,
//! turns every namespaced event into a [`ChannelMessage`] and forwards it in
//! arrival order. List/app/fleet calls go over REST.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use botdeck_protocol::{
    AppAction, AppEventPayload, Application, EnginePacket, Envelope, FleetAction, Handshake,
    PacketKind, SocketPacket, API_NAMESPACE, EDIT_EVENT, SERVER_NAMESPACE, SOCKET_IO_PATH,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::rest::RestClient;
use crate::transport::{
    ChannelMessage, ConnectionState, Transport, TransportEvent, TransportMode,
};
use crate::{ClientError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Namespaces joined right after the handshake.
pub const NAMESPACES: [&str; 2] = [SERVER_NAMESPACE, API_NAMESPACE];

pub struct PushTransport {
    rest: RestClient,
    ws_url: Url,
    connect_timeout: Duration,
    events: mpsc::UnboundedSender<TransportEvent>,
    state: Arc<RwLock<ConnectionState>>,
    writer: Arc<Mutex<Option<WsWriter>>>,
    recv_task: Mutex<Option<JoinHandle<()>>>,
}

impl PushTransport {
    pub fn new(
        rest: RestClient,
        connect_timeout: Duration,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<TransportEvent>)> {
        let ws_url = socket_url(rest.base_url())?;
        let (events, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            rest,
            ws_url,
            connect_timeout,
            events,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            writer: Arc::new(Mutex::new(None)),
            recv_task: Mutex::new(None),
        });
        Ok((transport, rx))
    }

    pub fn ws_url(&self) -> &Url {
        &self.ws_url
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Open the socket, wait for the Engine.IO handshake, join both
    /// namespaces and start the reader task.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != ConnectionState::Disconnected {
                return Ok(());
            }
            *state = ConnectionState::Connecting;
        }
        self.emit(TransportEvent::Connection {
            state: ConnectionState::Connecting,
            detail: self.ws_url.to_string(),
        });

        match self.open().await {
            Ok(()) => Ok(()),
            Err(e) => {
                *self.state.write().await = ConnectionState::Disconnected;
                self.emit(TransportEvent::Connection {
                    state: ConnectionState::Disconnected,
                    detail: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn open(&self) -> Result<()> {
        let (stream, _response) = timeout(self.connect_timeout, connect_async(self.ws_url.as_str()))
            .await
            .map_err(|_| ClientError::Timeout(self.connect_timeout))?
            .map_err(|e| ClientError::WebSocket(e.to_string()))?;
        let (mut writer, mut reader) = stream.split();

        let handshake = timeout(self.connect_timeout, read_handshake(&mut reader))
            .await
            .map_err(|_| ClientError::Timeout(self.connect_timeout))??;
        info!(sid = %handshake.sid, ping_interval_ms = handshake.ping_interval, "socket.io handshake");

        for namespace in NAMESPACES {
            writer
                .send(Message::Text(SocketPacket::connect(namespace).to_frame()))
                .await
                .map_err(|e| ClientError::WebSocket(e.to_string()))?;
        }

        *self.writer.lock().await = Some(writer);
        *self.state.write().await = ConnectionState::Connected;
        self.emit(TransportEvent::Connection {
            state: ConnectionState::Connected,
            detail: handshake.sid.clone(),
        });

        // Server pings every ping_interval; silence past ping_timeout means the link is gone.
        let liveness = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
        let task = tokio::spawn(read_loop(
            reader,
            Arc::clone(&self.writer),
            Arc::clone(&self.state),
            self.events.clone(),
            liveness,
        ));
        if let Some(previous) = self.recv_task.lock().await.replace(task) {
            previous.abort();
        }
        Ok(())
    }

    /// Leave both namespaces and close the socket.
    pub async fn disconnect(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            for namespace in NAMESPACES {
                let _ = writer
                    .send(Message::Text(SocketPacket::disconnect(namespace).to_frame()))
                    .await;
            }
            let _ = writer.close().await;
        }
        if let Some(task) = self.recv_task.lock().await.take() {
            task.abort();
        }
        *self.state.write().await = ConnectionState::Disconnected;
    }

    /// Emit an `/api` event carrying `{appId, config?}`.
    async fn emit_api(&self, event: &str, payload: AppEventPayload) -> Result<()> {
        let data = serde_json::to_value(payload).map_err(|e| ClientError::Decode(e.to_string()))?;
        let frame = SocketPacket::event(API_NAMESPACE, event, data).to_frame();
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(ClientError::NotConnected)?;
        sink.send(Message::Text(frame))
            .await
            .map_err(|e| ClientError::WebSocket(e.to_string()))?;
        debug!(event, "api event sent");
        Ok(())
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl Transport for PushTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Push
    }

    async fn refresh_all(&self) -> Result<()> {
        let apps = self.rest.list().await?;
        self.emit(TransportEvent::Snapshot(apps));
        Ok(())
    }

    async fn perform_action(&self, app_id: &str, action: AppAction) -> Result<()> {
        self.emit_api(
            action.event_name(),
            AppEventPayload {
                app_id: app_id.to_string(),
                config: None,
            },
        )
        .await
    }

    async fn submit_config(&self, app_id: &str, config: Value) -> Result<()> {
        self.emit_api(
            EDIT_EVENT,
            AppEventPayload {
                app_id: app_id.to_string(),
                config: Some(config),
            },
        )
        .await
    }

    async fn fetch_app(&self, app_id: &str) -> Result<Option<Application>> {
        self.rest.app(app_id).await
    }

    async fn fleet(&self, action: FleetAction) -> Result<Envelope> {
        self.rest.fleet(action).await
    }
}

/// `http://host/prefix/` → `ws://host/prefix/ws/socket.io/?EIO=4&transport=websocket`
pub fn socket_url(base: &Url) -> Result<Url> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(ClientError::InvalidUrl(format!(
                "cannot derive a websocket url from scheme '{other}'"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::InvalidUrl(base.to_string()))?;
    let path = format!(
        "{}{}",
        base.path().trim_end_matches('/'),
        SOCKET_IO_PATH
    );
    url.set_path(&path);
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}

async fn read_handshake(reader: &mut WsReader) -> Result<Handshake> {
    while let Some(frame) = reader.next().await {
        match frame.map_err(|e| ClientError::WebSocket(e.to_string()))? {
            Message::Text(text) => match EnginePacket::decode(text.as_str())? {
                EnginePacket::Open(handshake) => return Ok(handshake),
                other => debug!(?other, "ignoring packet before handshake"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
    Err(ClientError::WebSocket(
        "socket closed before handshake".to_string(),
    ))
}

async fn read_loop(
    mut reader: WsReader,
    writer: Arc<Mutex<Option<WsWriter>>>,
    state: Arc<RwLock<ConnectionState>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    liveness: Duration,
) {
    let reason = loop {
        let frame = match timeout(liveness, reader.next()).await {
            Err(_) => break format!("no ping within {liveness:?}"),
            Ok(None) => break "socket closed".to_string(),
            Ok(Some(Err(e))) => break e.to_string(),
            Ok(Some(Ok(frame))) => frame,
        };
        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break "server closed the socket".to_string(),
            _ => continue,
        };
        match EnginePacket::decode(text.as_str()) {
            Ok(EnginePacket::Ping(body)) => {
                let mut guard = writer.lock().await;
                if let Some(sink) = guard.as_mut() {
                    if let Err(e) = sink.send(Message::Text(EnginePacket::Pong(body).encode())).await {
                        break e.to_string();
                    }
                }
            }
            Ok(EnginePacket::Message(body)) => match SocketPacket::decode(&body) {
                Ok(packet) => {
                    if let Some(event) = route_packet(packet) {
                        if events.send(event).is_err() {
                            break "event receiver dropped".to_string();
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "undecodable socket.io packet");
                    let _ = events.send(TransportEvent::Failure {
                        context: "push".to_string(),
                        error: e.to_string(),
                    });
                }
            },
            Ok(EnginePacket::Close) => break "server closed the session".to_string(),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "undecodable engine.io packet"),
        }
    };

    info!(%reason, "push channel closed");
    writer.lock().await.take();
    *state.write().await = ConnectionState::Disconnected;
    let _ = events.send(TransportEvent::Connection {
        state: ConnectionState::Disconnected,
        detail: reason,
    });
}

/// Map one decoded Socket.IO packet onto a transport event.
pub fn route_packet(packet: SocketPacket) -> Option<TransportEvent> {
    match packet.kind {
        PacketKind::Event => {
            let (name, arg) = packet.event_parts()?;
            let envelope = match arg {
                None | Some(Value::Null) => Envelope::default(),
                Some(value) => match serde_json::from_value::<Envelope>(value.clone()) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!(namespace = %packet.namespace, event = name, error = %e, "event without envelope");
                        return Some(TransportEvent::Failure {
                            context: format!("{}/{}", packet.namespace, name),
                            error: e.to_string(),
                        });
                    }
                },
            };
            Some(TransportEvent::Channel(ChannelMessage {
                namespace: packet.namespace.clone(),
                event: name.to_string(),
                envelope,
            }))
        }
        PacketKind::Connect => {
            debug!(namespace = %packet.namespace, "namespace joined");
            None
        }
        PacketKind::ConnectError => {
            let detail = packet
                .payload
                .as_ref()
                .and_then(|p| p.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("connect error")
                .to_string();
            Some(TransportEvent::Failure {
                context: packet.namespace,
                error: detail,
            })
        }
        PacketKind::Disconnect => {
            info!(namespace = %packet.namespace, "namespace left by server");
            None
        }
        PacketKind::Ack => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn socket_url_from_http_base() {
        let base = Url::parse("http://127.0.0.1:8000/").unwrap();
        assert_eq!(
            socket_url(&base).unwrap().as_str(),
            "ws://127.0.0.1:8000/ws/socket.io/?EIO=4&transport=websocket"
        );

        let base = Url::parse("https://bots.example.com/manager/").unwrap();
        assert_eq!(
            socket_url(&base).unwrap().as_str(),
            "wss://bots.example.com/manager/ws/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn event_packet_becomes_channel_message() {
        let packet = SocketPacket::event(
            "/server",
            "app_started",
            json!({"status": "info", "message": "echo started", "data": null}),
        );
        let Some(TransportEvent::Channel(msg)) = route_packet(packet) else {
            panic!("expected channel message");
        };
        assert_eq!(msg.namespace, "/server");
        assert_eq!(msg.event, "app_started");
        assert_eq!(msg.envelope.message.as_deref(), Some("echo started"));
    }

    #[test]
    fn event_without_argument_gets_empty_envelope() {
        let packet = SocketPacket::decode(r#"2/api,["ping_me"]"#).unwrap();
        let Some(TransportEvent::Channel(msg)) = route_packet(packet) else {
            panic!("expected channel message");
        };
        assert!(msg.envelope.message.is_none());
    }

    #[test]
    fn connect_error_is_reported() {
        let packet = SocketPacket::decode(r#"4/api,{"message":"denied"}"#).unwrap();
        assert_eq!(
            route_packet(packet),
            Some(TransportEvent::Failure {
                context: "/api".to_string(),
                error: "denied".to_string(),
            })
        );
    }
}

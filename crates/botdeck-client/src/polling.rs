//! REST transport with refresh-after-write and a fixed-interval poller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use botdeck_protocol::{AppAction, Application, Envelope, FleetAction};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cursor::LogCursor;
use crate::rest::RestClient;
use crate::transport::{Transport, TransportEvent, TransportMode};
use crate::Result;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct PollingTransport {
    rest: RestClient,
    events: mpsc::UnboundedSender<TransportEvent>,
    cursor: Mutex<LogCursor>,
    interval: Duration,
}

impl PollingTransport {
    pub fn new(
        rest: RestClient,
        interval: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            rest,
            events,
            cursor: Mutex::new(LogCursor::new()),
            interval,
        });
        (transport, rx)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Fetch the list and any log entries newer than the cursor.
    pub async fn poll_once(&self) -> Result<()> {
        self.refresh_all().await?;
        let since = self.cursor.lock().await.since();
        self.fetch_logs(since).await
    }

    /// Run [`poll_once`](Self::poll_once) every interval until the receiver is dropped.
    ///
    /// Ticks are not skipped or jittered; a slow poll delays the next one.
    pub fn spawn_poller(self: &Arc<Self>) -> JoinHandle<()> {
        let transport = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(transport.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(interval = ?transport.interval, "poller started");
            loop {
                ticker.tick().await;
                if transport.events.is_closed() {
                    break;
                }
                if let Err(e) = transport.poll_once().await {
                    warn!(error = %e, "poll failed");
                    transport.emit(TransportEvent::Failure {
                        context: "poll".to_string(),
                        error: e.to_string(),
                    });
                }
            }
            debug!("poller stopped");
        })
    }

    async fn fetch_logs(&self, since: i64) -> Result<()> {
        let entries = self.rest.logs(since).await?;
        let fresh = self.cursor.lock().await.admit(entries);
        if !fresh.is_empty() {
            self.emit(TransportEvent::Logs(fresh));
        }
        Ok(())
    }

    /// Re-read authoritative state after a mutating call started at `started`.
    async fn refresh_after_write(&self, started: i64) -> Result<()> {
        self.refresh_all().await?;
        self.fetch_logs(started).await
    }

    fn emit(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            debug!("transport event dropped, receiver closed");
        }
    }
}

#[async_trait]
impl Transport for PollingTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Poll
    }

    async fn refresh_all(&self) -> Result<()> {
        let apps = self.rest.list().await?;
        self.emit(TransportEvent::Snapshot(apps));
        Ok(())
    }

    async fn perform_action(&self, app_id: &str, action: AppAction) -> Result<()> {
        let started = chrono::Utc::now().timestamp();
        let ack = self.rest.action(app_id, action).await?;
        debug!(app_id, %action, status = %ack.status, "action acknowledged");
        self.refresh_after_write(started).await
    }

    async fn submit_config(&self, app_id: &str, config: Value) -> Result<()> {
        let started = chrono::Utc::now().timestamp();
        let verdict = self.rest.edit(app_id, config).await?;
        let accepted = verdict.status.is_success();
        self.emit(TransportEvent::EditResult(verdict));
        if accepted {
            self.refresh_after_write(started).await?;
        }
        Ok(())
    }

    async fn fetch_app(&self, app_id: &str) -> Result<Option<Application>> {
        self.rest.app(app_id).await
    }

    async fn fleet(&self, action: FleetAction) -> Result<Envelope> {
        let started = chrono::Utc::now().timestamp();
        let ack = self.rest.fleet(action).await?;
        if action != FleetAction::Shutdown {
            self.refresh_after_write(started).await?;
        }
        Ok(ack)
    }
}

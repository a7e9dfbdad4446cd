//! The headless dashboard and the routing of transport events into it.

use botdeck_client::{ChannelMessage, ConnectionState, TransportEvent, TransportMode};
use botdeck_protocol::{Application, Status, API_NAMESPACE, EDIT_EVENT};

use crate::editor::{ConfigEditor, EditorError, Modal, TerminalModal};
use crate::log_panel::{LogPanel, LogRecord};
use crate::registry::AppRegistry;
use crate::table::{TableView, TokenDisplay};

/// Where the editor gets the application it opens.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorSource {
    /// Resolved from the registry; already applied to the editor.
    Resolved,
    /// Must be fetched from the backend, then passed to
    /// [`ConfigEditor::finish_open`].
    Fetch(String),
}

/// Everything the operator sees, owned by the UI task.
#[derive(Debug)]
pub struct Dashboard<M: Modal = TerminalModal> {
    pub registry: AppRegistry,
    pub table: TableView,
    pub log: LogPanel,
    pub editor: ConfigEditor<M>,
    mode: TransportMode,
    connection: ConnectionState,
}

impl<M: Modal> Dashboard<M> {
    pub fn new(mode: TransportMode, log_capacity: usize, tokens: TokenDisplay, modal: M) -> Self {
        Self {
            registry: AppRegistry::new(),
            table: TableView::new(tokens),
            log: LogPanel::new(log_capacity),
            editor: ConfigEditor::new(modal),
            mode,
            connection: match mode {
                TransportMode::Poll => ConnectionState::Connected,
                TransportMode::Push => ConnectionState::Disconnected,
            },
        }
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn apply(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Snapshot(apps) => self.replace_all(apps),
            TransportEvent::Logs(entries) => {
                let records: Vec<_> = entries.into_iter().map(LogRecord::Runtime).collect();
                self.log.extend(&records);
            }
            TransportEvent::Channel(message) => self.route_channel(message),
            TransportEvent::EditResult(verdict) => {
                self.editor.finish_save(&verdict);
            }
            TransportEvent::Connection { state, detail } => {
                self.connection = state;
                let status = match state {
                    ConnectionState::Connected => Status::Success,
                    ConnectionState::Connecting => Status::Info,
                    ConnectionState::Disconnected => Status::Error,
                };
                self.log.append(&LogRecord::local(status, detail));
            }
            TransportEvent::Failure { context, error } => {
                self.report_error(&context, &error);
            }
        }
    }

    fn route_channel(&mut self, message: ChannelMessage) {
        let ChannelMessage {
            namespace,
            event,
            envelope,
        } = message;

        if let Some(text) = envelope.message.as_deref() {
            self.log.append(&LogRecord::Channel {
                namespace: namespace.clone(),
                event: event.clone(),
                status: envelope.status,
                message: text.to_string(),
            });
        }

        if namespace != API_NAMESPACE {
            return;
        }

        if event == EDIT_EVENT {
            self.editor.finish_save(&envelope);
        }

        if !envelope.status.is_success() {
            return;
        }
        match envelope.app_update() {
            Ok(Some(app)) => {
                let id = app.id.clone();
                // Unknown ids are reported by the registry and otherwise ignored.
                let _ = self.registry.upsert(&id, app, &mut self.table);
                return;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(%event, error = %e, "malformed app_update payload");
                return;
            }
        }
        match envelope.apps_update() {
            Ok(Some(apps)) => self.replace_all(apps),
            Ok(None) => {}
            Err(e) => tracing::warn!(%event, error = %e, "malformed apps_update payload"),
        }
    }

    pub fn replace_all(&mut self, apps: Vec<Application>) {
        self.registry.replace_all(apps, &mut self.table);
    }

    /// Begin opening the editor for `app_id`. In push mode the registry
    /// answers immediately; in poll mode the caller must fetch the
    /// application.
    pub fn open_editor(&mut self, app_id: &str) -> Result<EditorSource, EditorError> {
        self.editor.begin_open(app_id)?;
        match self.mode {
            TransportMode::Push => {
                let app = self.registry.get(app_id).cloned();
                self.editor.finish_open(app_id, Ok(app));
                Ok(EditorSource::Resolved)
            }
            TransportMode::Poll => Ok(EditorSource::Fetch(app_id.to_string())),
        }
    }

    pub fn report_error(&mut self, context: &str, error: &str) {
        tracing::error!(context, error, "operation failed");
        self.log
            .append(&LogRecord::local(Status::Error, format!("{context}: {error}")));
    }

    pub fn report(&mut self, status: Status, text: impl Into<String>) {
        self.log.append(&LogRecord::local(status, text));
    }
}

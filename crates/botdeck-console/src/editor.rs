//! Configuration editor dialog.
//!
//! ```text
//! Closed ──begin_open──▶ Opening ──finish_open(found)──▶ Open
//!   ▲                      │ (not found: alert, back to Closed)
//!   │                      ▼
//!   └──finish_save(success)── Saving ◀──begin_save(valid JSON)── Open
//!                              │
//!                              └──finish_save(other)/fail_save──▶ Open
//! ```
//!
//! The form is populated from the application as it was when the dialog
//! opened; later registry updates do not touch an open dialog.

use botdeck_protocol::{Application, Envelope, Status};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::text_buffer::TextBuffer;

/// Show/hide capability of whatever hosts the dialog.
pub trait Modal {
    fn open(&mut self);
    fn hide(&mut self);
    fn is_visible(&self) -> bool;
    /// Runs after the form is populated and before [`open`](Modal::open).
    fn on_show(&mut self, _title: &str) {}
}

/// Modal backed by a visibility flag the terminal frontend reads.
#[derive(Debug, Default)]
pub struct TerminalModal {
    visible: bool,
}

impl Modal for TerminalModal {
    fn open(&mut self) {
        self.visible = true;
    }

    fn hide(&mut self) {
        self.visible = false;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditorError {
    #[error("editor is busy with application '{0}'")]
    Busy(String),

    #[error("no configuration dialog is open")]
    NotOpen,

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorPhase {
    Closed,
    Opening,
    Open,
    Saving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Danger,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineAlert {
    pub kind: AlertKind,
    pub message: String,
}

impl InlineAlert {
    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Danger,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Warning,
            message: message.into(),
        }
    }
}

/// Read-only description of one configuration field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRow {
    pub name: String,
    pub kind: String,
    pub default: String,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct EditorForm {
    pub app_id: String,
    pub title: String,
    pub text: TextBuffer,
    pub fields: Vec<FieldRow>,
    /// Application as it was when the dialog opened.
    pub snapshot: Application,
}

/// A validated configuration ready to submit.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub app_id: String,
    pub config: Value,
}

#[derive(Debug)]
pub struct ConfigEditor<M: Modal> {
    modal: M,
    phase: EditorPhase,
    pending: Option<String>,
    form: Option<EditorForm>,
    alert: Option<InlineAlert>,
}

impl<M: Modal> ConfigEditor<M> {
    pub fn new(modal: M) -> Self {
        Self {
            modal,
            phase: EditorPhase::Closed,
            pending: None,
            form: None,
            alert: None,
        }
    }

    pub fn phase(&self) -> EditorPhase {
        self.phase
    }

    /// True while the dialog is on screen (open or saving).
    pub fn is_active(&self) -> bool {
        matches!(self.phase, EditorPhase::Open | EditorPhase::Saving)
    }

    pub fn form(&self) -> Option<&EditorForm> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut EditorForm> {
        self.form.as_mut()
    }

    pub fn alert(&self) -> Option<&InlineAlert> {
        self.alert.as_ref()
    }

    pub fn modal(&self) -> &M {
        &self.modal
    }

    /// Id whose lookup is in flight.
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Start opening the dialog for `app_id`. Clears any previous alert.
    pub fn begin_open(&mut self, app_id: &str) -> Result<(), EditorError> {
        if self.phase != EditorPhase::Closed {
            let busy = self
                .form
                .as_ref()
                .map(|f| f.app_id.clone())
                .or_else(|| self.pending.clone())
                .unwrap_or_default();
            return Err(EditorError::Busy(busy));
        }
        self.alert = None;
        self.pending = Some(app_id.to_string());
        self.phase = EditorPhase::Opening;
        Ok(())
    }

    /// Complete an open with the looked-up application. A missing
    /// application or a lookup error leaves the dialog closed with a danger
    /// alert. Results for a stale id are ignored.
    pub fn finish_open(&mut self, app_id: &str, lookup: Result<Option<Application>, String>) {
        if self.phase != EditorPhase::Opening || self.pending.as_deref() != Some(app_id) {
            tracing::debug!(app_id, "stale editor lookup ignored");
            return;
        }
        self.pending = None;

        let app = match lookup {
            Ok(Some(app)) => app,
            Ok(None) => {
                self.phase = EditorPhase::Closed;
                self.alert = Some(InlineAlert::danger(format!("No app found with ID {app_id}")));
                return;
            }
            Err(error) => {
                self.phase = EditorPhase::Closed;
                self.alert = Some(InlineAlert::danger(error));
                return;
            }
        };

        let form = populate(app);
        self.modal.on_show(&form.title);
        self.form = Some(form);
        self.phase = EditorPhase::Open;
        self.modal.open();
    }

    /// Parse the edited text. Malformed JSON keeps the dialog open with a
    /// danger alert and yields no request.
    pub fn begin_save(&mut self) -> Result<SaveRequest, EditorError> {
        if self.phase != EditorPhase::Open {
            return Err(EditorError::NotOpen);
        }
        let Some(form) = self.form.as_ref() else {
            return Err(EditorError::NotOpen);
        };

        match serde_json::from_str::<Value>(&form.text.text()) {
            Ok(config) => {
                let request = SaveRequest {
                    app_id: form.app_id.clone(),
                    config,
                };
                self.alert = None;
                self.phase = EditorPhase::Saving;
                Ok(request)
            }
            Err(e) => {
                let err = EditorError::InvalidJson(e.to_string());
                self.alert = Some(InlineAlert::danger(err.to_string()));
                Err(err)
            }
        }
    }

    /// Apply the backend's verdict on a submitted configuration. Returns
    /// false when no save was in flight.
    pub fn finish_save(&mut self, verdict: &Envelope) -> bool {
        if self.phase != EditorPhase::Saving {
            return false;
        }
        if verdict.status.is_success() {
            tracing::info!(
                app_id = self.form.as_ref().map(|f| f.app_id.as_str()).unwrap_or_default(),
                "configuration saved"
            );
            self.close();
            return true;
        }

        let message = verdict
            .message
            .clone()
            .unwrap_or_else(|| format!("Configuration not saved ({})", verdict.status));
        self.alert = Some(match verdict.status {
            Status::Error => InlineAlert::danger(message),
            _ => InlineAlert::warning(message),
        });
        self.phase = EditorPhase::Open;
        true
    }

    /// The submit itself failed before any verdict arrived.
    pub fn fail_save(&mut self, error: &str) {
        if self.phase != EditorPhase::Saving {
            return;
        }
        self.alert = Some(InlineAlert::danger(error));
        self.phase = EditorPhase::Open;
    }

    /// Dismiss the dialog without saving.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.alert = None;
        self.close();
    }

    fn close(&mut self) {
        self.form = None;
        self.phase = EditorPhase::Closed;
        self.modal.hide();
    }
}

fn populate(app: Application) -> EditorForm {
    let fields = app
        .fields
        .as_ref()
        .map(|fields| {
            fields
                .iter()
                .map(|(name, schema)| FieldRow {
                    name: name.clone(),
                    kind: schema.kind.clone(),
                    default: schema.default.to_string(),
                    required: schema.required,
                })
                .collect()
        })
        .unwrap_or_default();

    EditorForm {
        app_id: app.id.clone(),
        title: format!("Edit config for @{}", app.bot.username),
        text: TextBuffer::from_text(&pretty_config(&app.config)),
        fields,
        snapshot: app,
    }
}

/// Pretty-print a configuration with 4-space indentation.
pub fn pretty_config(config: &Value) -> String {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    match config.serialize(&mut ser) {
        Ok(()) => String::from_utf8(out).unwrap_or_else(|_| config.to_string()),
        Err(_) => config.to_string(),
    }
}

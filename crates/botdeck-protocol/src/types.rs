use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

// ═══════════════════════════════════════════════════════════════
// Applications
// ═══════════════════════════════════════════════════════════════

/// Telegram identity of the bot behind an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub link: String,
    /// Remaining bot attributes the backend sends (first name, can_join_groups, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Schema descriptor for one configuration field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub required: bool,
}

/// One managed application as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    #[serde(default)]
    pub bot: BotInfo,
    #[serde(default)]
    pub telegram_token: String,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub config: Value,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, FieldSchema>>,
}

impl Application {
    /// `@username` handle, or the bare id when the bot has not been resolved yet.
    pub fn handle(&self) -> String {
        if self.bot.username.is_empty() {
            self.id.clone()
        } else {
            format!("@{}", self.bot.username)
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Status and envelopes
// ═══════════════════════════════════════════════════════════════

/// Outcome tag carried by every backend response and event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    Warning,
    #[default]
    #[serde(other)]
    Info,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Error => "error",
            Status::Warning => "warning",
            Status::Info => "info",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{status, message?, data?}` envelope used by REST acks and push events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn with_status(status: Status, message: Option<String>) -> Self {
        Self {
            status,
            message,
            data: None,
        }
    }

    /// Single-application push carried in `data.app_update`.
    pub fn app_update(&self) -> Result<Option<Application>, ProtocolError> {
        self.data_field("app_update")
    }

    /// Full-list push carried in `data.apps_update`.
    pub fn apps_update(&self) -> Result<Option<Vec<Application>>, ProtocolError> {
        self.data_field("apps_update")
    }

    fn data_field<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, ProtocolError> {
        let Some(value) = self.data.as_ref().and_then(|data| data.get(key)) else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| ProtocolError::Payload(format!("data.{key}: {e}")))
    }
}

// ═══════════════════════════════════════════════════════════════
// REST bodies
// ═══════════════════════════════════════════════════════════════

/// `GET /list` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub applications: Vec<Application>,
}

/// `GET /app/:id` response; `data` is absent when the id is unknown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppResponse {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Application>,
}

/// Body of `PATCH /app/:id/edit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRequest {
    pub new_config: Value,
}

/// One runtime log line kept by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub text: String,
    #[serde(default)]
    pub status: Status,
    /// Unix seconds.
    pub timestamp: i64,
}

impl LogEntry {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }
}

/// `GET /logs?since=` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsResponse {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

/// Argument object of the client→server app events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppEventPayload {
    #[serde(rename = "appId")]
    pub app_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

// ═══════════════════════════════════════════════════════════════
// Actions
// ═══════════════════════════════════════════════════════════════

/// Per-application lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppAction {
    Start,
    Restart,
    Reload,
    Stop,
}

impl AppAction {
    pub const ALL: [AppAction; 4] = [
        AppAction::Start,
        AppAction::Restart,
        AppAction::Reload,
        AppAction::Stop,
    ];

    /// REST route prefix, e.g. `start_app` in `POST /start_app/:id`.
    pub fn route(&self) -> &'static str {
        match self {
            AppAction::Start => "start_app",
            AppAction::Restart => "restart_app",
            AppAction::Reload => "reload_app",
            AppAction::Stop => "stop_app",
        }
    }

    /// Event name emitted on the `/api` namespace.
    pub fn event_name(&self) -> &'static str {
        match self {
            AppAction::Start => "app_start",
            AppAction::Restart => "app_restart",
            AppAction::Reload => "app_reload",
            AppAction::Stop => "app_stop",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AppAction::Start => "Start",
            AppAction::Restart => "Restart",
            AppAction::Reload => "Reload",
            AppAction::Stop => "Stop",
        }
    }
}

impl fmt::Display for AppAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whole-fleet operation, always a bare `GET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FleetAction {
    ReloadConfig,
    StartAll,
    StopAll,
    Shutdown,
}

impl FleetAction {
    pub fn route(&self) -> &'static str {
        match self {
            FleetAction::ReloadConfig => "reload_config",
            FleetAction::StartAll => "start_all",
            FleetAction::StopAll => "stop_all",
            FleetAction::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for FleetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.route())
    }
}

/// Name of the push event that acknowledges a configuration edit.
pub const EDIT_EVENT: &str = "app_edit";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_status_decodes_as_info() {
        let env: Envelope = serde_json::from_value(json!({"status": "pending"})).unwrap();
        assert_eq!(env.status, Status::Info);
    }

    #[test]
    fn application_accepts_minimal_list_entry() {
        let app: Application =
            serde_json::from_value(json!({"id": "1", "telegram_token": "t", "running": true}))
                .unwrap();
        assert_eq!(app.id, "1");
        assert!(app.running);
        assert_eq!(app.handle(), "1");
        assert!(app.fields.is_none());
    }

    #[test]
    fn app_update_ignores_absent_and_null_data() {
        let env = Envelope::success("ok");
        assert!(env.app_update().unwrap().is_none());

        let env: Envelope =
            serde_json::from_value(json!({"status": "success", "data": {"app_update": null}}))
                .unwrap();
        assert!(env.app_update().unwrap().is_none());
    }

    #[test]
    fn malformed_app_update_is_a_payload_error() {
        let env: Envelope = serde_json::from_value(
            json!({"status": "success", "data": {"app_update": {"running": true}}}),
        )
        .unwrap();
        assert!(matches!(env.app_update(), Err(ProtocolError::Payload(_))));
    }

    #[test]
    fn action_routes_and_events() {
        assert_eq!(AppAction::Restart.route(), "restart_app");
        assert_eq!(AppAction::Stop.event_name(), "app_stop");
        assert_eq!(FleetAction::ReloadConfig.route(), "reload_config");
    }
}

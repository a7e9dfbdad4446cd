//! JSON-over-HTTP client for the backend's REST routes.

use std::time::Duration;

use botdeck_protocol::{
    AppAction, AppResponse, Application, EditRequest, Envelope, FleetAction, ListResponse,
    LogEntry, LogsResponse,
};
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{ClientError, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct RestClient {
    base: Url,
    http: reqwest::Client,
}

impl RestClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ClientError::InvalidUrl(format!(
                "URL must use http:// or https:// scheme, got: {}",
                base.scheme()
            )));
        }
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Base URL with `segments` appended, each percent-encoded on its own.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `GET /list`
    pub async fn list(&self) -> Result<Vec<Application>> {
        let url = self.endpoint(&["list"])?;
        let body: ListResponse = self.send(Method::GET, url, None).await?;
        Ok(body.applications)
    }

    /// `GET /app/:id`; `None` when the backend has no such application.
    pub async fn app(&self, app_id: &str) -> Result<Option<Application>> {
        let url = self.endpoint(&["app", app_id])?;
        let body: AppResponse = self.send(Method::GET, url, None).await?;
        Ok(body.data)
    }

    /// `POST /<action>_app/:id`
    pub async fn action(&self, app_id: &str, action: AppAction) -> Result<Envelope> {
        let url = self.endpoint(&[action.route(), app_id])?;
        self.send_envelope(Method::POST, url, None).await
    }

    /// `PATCH /app/:id/edit` with `{new_config}`.
    pub async fn edit(&self, app_id: &str, new_config: Value) -> Result<Envelope> {
        let url = self.endpoint(&["app", app_id, "edit"])?;
        let body = serde_json::to_value(EditRequest { new_config })
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        self.send_envelope(Method::PATCH, url, Some(body)).await
    }

    /// `GET /logs?since=<unix seconds>`
    pub async fn logs(&self, since: i64) -> Result<Vec<LogEntry>> {
        let mut url = self.endpoint(&["logs"])?;
        url.query_pairs_mut()
            .append_pair("since", &since.max(0).to_string());
        let body: LogsResponse = self.send(Method::GET, url, None).await?;
        Ok(body.logs)
    }

    /// `GET /reload_config`, `/start_all`, `/stop_all`, `/shutdown`
    pub async fn fleet(&self, action: FleetAction) -> Result<Envelope> {
        let url = self.endpoint(&[action.route()])?;
        self.send_envelope(Method::GET, url, None).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<T> {
        let text = self.send_raw(method, url, body).await?;
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Acks may come back empty (shutdown) or as `null`; both read as a bare `info`.
    async fn send_envelope(&self, method: Method, url: Url, body: Option<Value>) -> Result<Envelope> {
        let text = self.send_raw(method, url, body).await?;
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(Envelope::default());
        }
        serde_json::from_str(trimmed).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn send_raw(&self, method: Method, url: Url, body: Option<Value>) -> Result<String> {
        debug!(%method, %url, "backend request");
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        read_body(response).await
    }
}

async fn read_body(response: Response) -> Result<String> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ClientError::Http {
            status: status.as_u16(),
            body: text,
        });
    }
    Ok(text)
}

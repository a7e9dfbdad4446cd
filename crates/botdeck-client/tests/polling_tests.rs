//! PollingTransport against an in-process fake backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use botdeck_client::{ClientError, PollingTransport, RestClient, Transport, TransportEvent};
use botdeck_protocol::{AppAction, FleetAction, Status};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

// ─── Fake backend ────────────────────────────────────────────────────────────

#[derive(Default)]
struct Backend {
    running: bool,
    logs: Vec<Value>,
}

type Shared = Arc<Mutex<Backend>>;

fn app_json(running: bool) -> Value {
    json!({
        "id": "1",
        "bot": {"username": "echo_bot", "link": "https://t.me/echo_bot"},
        "telegram_token": "123:abc",
        "running": running,
        "config": {"greeting": "hi"},
        "fields": {"greeting": {"type": "str", "default": "hello", "required": false}}
    })
}

async fn list(State(s): State<Shared>) -> Json<Value> {
    let running = s.lock().unwrap().running;
    Json(json!({"status": "success", "applications": [app_json(running)]}))
}

async fn get_app(Path(id): Path<String>, State(s): State<Shared>) -> Json<Value> {
    if id != "1" {
        return Json(json!({"status": "error", "message": format!("No app found with ID {id}")}));
    }
    let running = s.lock().unwrap().running;
    Json(json!({"status": "success", "data": app_json(running)}))
}

async fn start_app(Path(id): Path<String>, State(s): State<Shared>) -> Json<Value> {
    let mut backend = s.lock().unwrap();
    backend.running = true;
    let ts = chrono::Utc::now().timestamp();
    backend.logs.push(json!({"text": format!("start_app - app_id: {id}"), "status": "success", "timestamp": ts}));
    Json(json!({"status": "success", "message": format!("Started app with ID {id}")}))
}

async fn edit(Path(_id): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    if body["new_config"].get("greeting").is_some_and(Value::is_number) {
        return Json(json!({"status": "error", "message": "greeting: str type expected"}));
    }
    Json(json!({"status": "success", "data": app_json(false)}))
}

#[derive(Deserialize)]
struct Since {
    #[serde(default)]
    since: i64,
}

async fn logs(Query(q): Query<Since>, State(s): State<Shared>) -> Json<Value> {
    let backend = s.lock().unwrap();
    let logs: Vec<Value> = backend
        .logs
        .iter()
        .filter(|entry| q.since == 0 || entry["timestamp"].as_i64().unwrap_or(0) >= q.since)
        .cloned()
        .collect();
    Json(json!({"status": "success", "logs": logs}))
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom")
}

async fn spawn_backend(state: Shared) -> String {
    let app = Router::new()
        .route("/list", get(list))
        .route("/app/:id", get(get_app))
        .route("/app/:id/edit", patch(edit))
        .route("/start_app/:id", post(start_app))
        .route("/stop_app/:id", post(broken))
        .route("/logs", get(logs))
        .route("/start_all", get(|| async { Json(json!({"status": "success"})) }))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn next_event(rx: &mut UnboundedReceiver<TransportEvent>) -> TransportEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event timeout")
        .expect("channel open")
}

async fn transport(state: Shared) -> (Arc<PollingTransport>, UnboundedReceiver<TransportEvent>) {
    let base = spawn_backend(state).await;
    let rest = RestClient::new(&base, Duration::from_secs(5)).unwrap();
    PollingTransport::new(rest, Duration::from_secs(5))
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_action_refreshes_list_and_logs() {
    let (transport, mut rx) = transport(Arc::new(Mutex::new(Backend::default()))).await;

    transport.perform_action("1", AppAction::Start).await.unwrap();

    match next_event(&mut rx).await {
        TransportEvent::Snapshot(apps) => {
            assert_eq!(apps.len(), 1);
            assert!(apps[0].running, "list must be re-read after the write");
        }
        other => panic!("expected snapshot, got {other:?}"),
    }
    match next_event(&mut rx).await {
        TransportEvent::Logs(entries) => {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].text, "start_app - app_id: 1");
            assert_eq!(entries[0].status, Status::Success);
        }
        other => panic!("expected logs, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_edit_reports_verdict_without_refresh() {
    let (transport, mut rx) = transport(Arc::new(Mutex::new(Backend::default()))).await;

    transport
        .submit_config("1", json!({"greeting": 5}))
        .await
        .unwrap();

    match next_event(&mut rx).await {
        TransportEvent::EditResult(verdict) => {
            assert_eq!(verdict.status, Status::Error);
            assert_eq!(verdict.message.as_deref(), Some("greeting: str type expected"));
        }
        other => panic!("expected edit result, got {other:?}"),
    }
    assert!(rx.try_recv().is_err(), "no refresh after a rejected edit");
}

#[tokio::test]
async fn test_fetch_app_known_and_unknown() {
    let (transport, _rx) = transport(Arc::new(Mutex::new(Backend::default()))).await;

    let app = transport.fetch_app("1").await.unwrap().expect("app 1");
    assert_eq!(app.bot.username, "echo_bot");
    assert!(app.fields.unwrap().contains_key("greeting"));

    assert!(transport.fetch_app("42").await.unwrap().is_none());
}

#[tokio::test]
async fn test_repeated_polls_do_not_duplicate_logs() {
    let state: Shared = Arc::new(Mutex::new(Backend::default()));
    state.lock().unwrap().logs.push(json!({"text": "auto started", "status": "success", "timestamp": 1_700_000_000}));
    let (transport, mut rx) = transport(state).await;

    transport.poll_once().await.unwrap();
    transport.poll_once().await.unwrap();

    let mut log_batches = 0;
    while let Ok(event) = rx.try_recv() {
        if let TransportEvent::Logs(entries) = event {
            assert_eq!(entries.len(), 1);
            log_batches += 1;
        }
    }
    assert_eq!(log_batches, 1);
}

#[tokio::test]
async fn test_http_failure_is_a_transport_error() {
    let (transport, _rx) = transport(Arc::new(Mutex::new(Backend::default()))).await;

    let err = transport
        .perform_action("1", AppAction::Stop)
        .await
        .expect_err("500 must fail");
    match err {
        ClientError::Http { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_fleet_ack_is_returned() {
    let (transport, mut rx) = transport(Arc::new(Mutex::new(Backend::default()))).await;

    let ack = transport.fleet(FleetAction::StartAll).await.unwrap();
    assert_eq!(ack.status, Status::Success);
    assert!(matches!(next_event(&mut rx).await, TransportEvent::Snapshot(_)));
}

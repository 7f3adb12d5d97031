// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Integration tests for the account session against a mock cloud served
//! by Axum: HTTP login/snapshot/command endpoints plus the streaming
//! WebSocket.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    http::header::SET_COOKIE,
    response::{IntoResponse, Response},
    routing::{get, post},
    serve,
};
use pandora_cas::{
    Account, AccountConfig,
    common::enums::{AccountStatus, CommandId, CommandOutcome},
    model::DeviceNotification,
};
use serde_json::{Value, json};
use tokio::sync::broadcast;

// ------------------------------------------------------------------------------------------------
// Mock cloud
// ------------------------------------------------------------------------------------------------

#[derive(Clone, Debug)]
enum ServerDirective {
    Frame(String),
    Close(u16),
}

struct TestServerState {
    login_count: AtomicUsize,
    ws_connections: AtomicUsize,
    command_posts: tokio::sync::Mutex<Vec<String>>,
    directive_tx: broadcast::Sender<ServerDirective>,
    updates_body: tokio::sync::Mutex<Value>,
    initial_state_frame: tokio::sync::Mutex<Value>,
}

impl TestServerState {
    fn new() -> Arc<Self> {
        let (directive_tx, _) = broadcast::channel(32);
        Arc::new(Self {
            login_count: AtomicUsize::new(0),
            ws_connections: AtomicUsize::new(0),
            command_posts: tokio::sync::Mutex::new(Vec::new()),
            directive_tx,
            updates_body: tokio::sync::Mutex::new(default_updates_body()),
            initial_state_frame: tokio::sync::Mutex::new(default_initial_state_frame()),
        })
    }

    fn send_frame(&self, frame: Value) {
        let _ = self
            .directive_tx
            .send(ServerDirective::Frame(frame.to_string()));
    }

    fn close_stream(&self, code: u16) {
        let _ = self.directive_tx.send(ServerDirective::Close(code));
    }
}

fn default_updates_body() -> Value {
    json!({
        "ts": 1_700_000_000,
        "stats": {
            "1234": {
                "online": 1,
                "bit_state_1": 1,
                "engine_rpm": 0,
                "speed": 0,
                "fuel": 50,
                "state_utc": 1000
            }
        }
    })
}

fn default_initial_state_frame() -> Value {
    json!({
        "type": "initial-state",
        "data": {
            "dev_id": 1234,
            "online_mode": 1,
            "bit_state_1": 1,
            "engine_rpm": 0,
            "speed": 0,
            "fuel": 50,
            "state_utc": 1000
        }
    })
}

async fn handle_login(State(state): State<Arc<TestServerState>>) -> Response {
    state.login_count.fetch_add(1, Ordering::SeqCst);
    (
        [(SET_COOKIE, "sid=test-session; Path=/")],
        Json(json!({"user_id": 1, "session_id": "test-session"})),
    )
        .into_response()
}

async fn handle_devices() -> Json<Value> {
    Json(json!([
        {
            "id": 1234,
            "name": "Test Car",
            "model": "DXL-5000",
            "firmware": "2.41",
            "type": "alarm",
            "features": {"autostart": 1, "heater": 1, "tracking": 1}
        }
    ]))
}

async fn handle_updates(State(state): State<Arc<TestServerState>>) -> Json<Value> {
    Json(state.updates_body.lock().await.clone())
}

async fn handle_command(State(state): State<Arc<TestServerState>>, body: String) -> Json<Value> {
    state.command_posts.lock().await.push(body);
    Json(json!({"action_result": {"1234": "sent"}}))
}

async fn handle_ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<TestServerState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<TestServerState>) {
    let mut directives = state.directive_tx.subscribe();
    state.ws_connections.fetch_add(1, Ordering::SeqCst);

    let initial = state.initial_state_frame.lock().await.clone();
    if socket
        .send(Message::Text(initial.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            directive = directives.recv() => match directive {
                Ok(ServerDirective::Frame(text)) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(ServerDirective::Close(code)) => {
                    let _ = socket
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: "".into(),
                        })))
                        .await;
                    break;
                }
                Err(_) => break,
            },
            message = socket.recv() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn start_mock_cloud(state: Arc<TestServerState>) -> SocketAddr {
    let router = Router::new()
        .route("/api/users/login", post(handle_login))
        .route("/api/devices", get(handle_devices))
        .route("/api/updates", get(handle_updates))
        .route("/api/devices/command", post(handle_command))
        .route("/api/v4/updates", get(handle_ws_upgrade))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        serve(listener, router).await.unwrap();
    });
    addr
}

fn test_config(addr: SocketAddr) -> AccountConfig {
    AccountConfig {
        base_url: format!("http://{addr}"),
        ..AccountConfig::new("user@example.com", "hunter2")
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool, what: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// ------------------------------------------------------------------------------------------------
// Scenarios
// ------------------------------------------------------------------------------------------------

#[tokio::test]
async fn test_happy_login_and_first_snapshot() {
    let state = TestServerState::new();
    let addr = start_mock_cloud(state.clone()).await;

    let account = Account::new(test_config(addr)).unwrap();
    account.start().await.unwrap();

    assert_eq!(*account.status().borrow(), AccountStatus::Ok);
    assert_eq!(state.login_count.load(Ordering::SeqCst), 1);

    let device = account.device(1234).expect("device discovered");
    let view = device.snapshot();
    assert_eq!(view.is_armed(), Some(true));
    assert_eq!(view.is_engine_running(), Some(false));
    assert_eq!(view.telemetry.engine_rpm, Some(0));
    assert!(view.is_online());

    let info = view.info.expect("identity from directory");
    assert_eq!(info.name, "Test Car");
    assert_eq!(info.model.as_deref(), Some("DXL-5000"));

    account.close().await;
    assert_eq!(*account.status().borrow(), AccountStatus::Closed);
}

#[tokio::test]
async fn test_stream_delta_merges_into_view() {
    let state = TestServerState::new();
    let addr = start_mock_cloud(state.clone()).await;

    let account = Account::new(test_config(addr)).unwrap();
    account.start().await.unwrap();
    wait_until(
        || state.ws_connections.load(Ordering::SeqCst) >= 1,
        "stream connect",
    )
    .await;

    let (_handle, mut listener) = account.subscribe_device(1234).unwrap();

    state.send_frame(json!({
        "type": "state",
        "data": {"dev_id": 1234, "speed": 42, "state_utc": 1001}
    }));

    let notification = tokio::time::timeout(Duration::from_secs(5), listener.recv())
        .await
        .expect("notification within deadline")
        .expect("listener open");
    let DeviceNotification::Updated { view, changed, .. } = notification else {
        panic!("expected update notification");
    };
    assert!(changed.contains(&"speed"));
    assert_eq!(view.telemetry.speed, Some(42.0));
    assert_eq!(view.telemetry.fuel, Some(50.0)); // untouched by the delta

    account.close().await;
}

#[tokio::test]
async fn test_command_round_trip() {
    let state = TestServerState::new();
    let addr = start_mock_cloud(state.clone()).await;

    let account = Arc::new(Account::new(test_config(addr)).unwrap());
    account.start().await.unwrap();
    wait_until(
        || state.ws_connections.load(Ordering::SeqCst) >= 1,
        "stream connect",
    )
    .await;

    let mut command_topic = account.subscribe_commands();

    let submitting = {
        let account = account.clone();
        tokio::spawn(async move {
            account
                .command(1234, CommandId::StartEngine, true)
                .await
                .unwrap()
        })
    };

    // Reply over the stream once the POST has been observed
    wait_until(
        || state.command_posts.try_lock().map(|p| !p.is_empty()).unwrap_or(false),
        "command POST",
    )
    .await;
    {
        let posts = state.command_posts.lock().await;
        assert!(posts[0].contains("id=1234"));
        assert!(posts[0].contains("command=4"));
    }
    state.send_frame(json!({
        "type": "command",
        "data": {"dev_id": 1234, "command": 4, "result": 0, "reply": 0}
    }));

    let outcome = submitting.await.unwrap();
    assert_eq!(outcome, CommandOutcome::Ok);

    let message = tokio::time::timeout(Duration::from_secs(5), command_topic.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.device_id, 1234);
    assert_eq!(message.command_id, 4);
    assert_eq!(message.result, CommandOutcome::Ok);

    let last = account.device(1234).unwrap().snapshot().last_command.unwrap();
    assert_eq!(last.command_id, 4);
    assert_eq!(last.result, Some(0));

    account.close().await;
}

#[tokio::test]
async fn test_reconnect_resyncs_with_initial_state() {
    let state = TestServerState::new();
    let addr = start_mock_cloud(state.clone()).await;

    let account = Account::new(test_config(addr)).unwrap();
    account.start().await.unwrap();
    wait_until(
        || state.ws_connections.load(Ordering::SeqCst) >= 1,
        "stream connect",
    )
    .await;
    assert_eq!(
        account.device(1234).unwrap().snapshot().telemetry.fuel,
        Some(50.0)
    );

    let (_handle, mut listener) = account.subscribe_device(1234).unwrap();

    // The next connection's initial-state carries fresher fuel
    *state.initial_state_frame.lock().await = json!({
        "type": "initial-state",
        "data": {"dev_id": 1234, "fuel": 55, "state_utc": 2000}
    });
    state.close_stream(1000);

    wait_until(
        || state.ws_connections.load(Ordering::SeqCst) >= 2,
        "stream reconnect",
    )
    .await;

    let notification = tokio::time::timeout(Duration::from_secs(5), listener.recv())
        .await
        .expect("notification within deadline")
        .expect("listener open");
    let DeviceNotification::Updated { view, changed, .. } = notification else {
        panic!("expected update notification");
    };
    assert!(changed.contains(&"fuel"));
    assert_eq!(view.telemetry.fuel, Some(55.0));

    account.close().await;
}

#[tokio::test]
async fn test_auth_expiry_mid_stream_refreshes_once() {
    let state = TestServerState::new();
    let addr = start_mock_cloud(state.clone()).await;

    let account = Account::new(test_config(addr)).unwrap();
    account.start().await.unwrap();
    wait_until(
        || state.ws_connections.load(Ordering::SeqCst) >= 1,
        "stream connect",
    )
    .await;
    assert_eq!(state.login_count.load(Ordering::SeqCst), 1);

    // Server expires the session; the first expiry retries without backoff
    state.close_stream(4401);

    wait_until(
        || state.ws_connections.load(Ordering::SeqCst) >= 2,
        "stream reconnect after refresh",
    )
    .await;
    assert_eq!(state.login_count.load(Ordering::SeqCst), 2);
    assert_eq!(*account.status().borrow(), AccountStatus::Ok);

    account.close().await;
}

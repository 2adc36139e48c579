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

//! Mock tradehub websocket server shared by the integration tests.

#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tradehub_client::{
    WsApiClient, WsApiClientConfig,
    websocket::{auth::SsidAuthMethod, requests::Request},
};

pub const TEST_SSID: &str = "test-ssid";
pub const SERVER_TIME_MILLIS: u64 = 1_700_000_000_000;

// ------------------------------------------------------------------------------------------------
// Test Server State
// ------------------------------------------------------------------------------------------------

#[derive(Debug)]
pub struct TestServerState {
    pub connection_count: AtomicUsize,
    pub reject_auth: AtomicBool,
    /// Answers `unsubscribeMessage` with `success=false`.
    pub fail_unsubscribe: AtomicBool,
    /// Inbound frames tagged with the connection number they arrived on.
    pub frames: tokio::sync::Mutex<Vec<(usize, Value)>>,
    deferred: tokio::sync::Mutex<Vec<(Value, Value)>>,
    pub positions: tokio::sync::Mutex<Vec<Value>>,
    pub history: tokio::sync::Mutex<Vec<Value>>,
    /// Overrides the `limit` echoed in snapshot pages.
    pub echoed_limit: tokio::sync::Mutex<Option<u64>>,
    push_tx: broadcast::Sender<Value>,
}

impl Default for TestServerState {
    fn default() -> Self {
        let (push_tx, _) = broadcast::channel(64);
        Self {
            connection_count: AtomicUsize::new(0),
            reject_auth: AtomicBool::new(false),
            fail_unsubscribe: AtomicBool::new(false),
            frames: tokio::sync::Mutex::new(Vec::new()),
            deferred: tokio::sync::Mutex::new(Vec::new()),
            positions: tokio::sync::Mutex::new(Vec::new()),
            history: tokio::sync::Mutex::new(Vec::new()),
            echoed_limit: tokio::sync::Mutex::new(None),
            push_tx,
        }
    }
}

impl TestServerState {
    pub fn connections(&self) -> usize {
        self.connection_count.load(Ordering::Relaxed)
    }

    /// Pushes a frame to every open connection.
    pub fn push(&self, frame: Value) {
        let _ = self.push_tx.send(frame);
    }

    /// Returns inbound frames named `name`.
    pub async fn frames_named(&self, name: &str) -> Vec<(usize, Value)> {
        self.frames
            .lock()
            .await
            .iter()
            .filter(|(_, frame)| frame["name"] == name)
            .cloned()
            .collect()
    }

    /// Returns the bodies of `sendMessage` frames calling `method`.
    pub async fn calls(&self, method: &str) -> Vec<Value> {
        self.frames_named("sendMessage")
            .await
            .into_iter()
            .filter(|(_, frame)| frame["msg"]["name"] == method)
            .map(|(_, frame)| frame["msg"]["body"].clone())
            .collect()
    }
}

// ------------------------------------------------------------------------------------------------
// Mock WebSocket Handler
// ------------------------------------------------------------------------------------------------

async fn handle_ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<TestServerState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_json(socket: &mut WebSocket, frame: &Value) -> bool {
    socket
        .send(Message::Text(frame.to_string().into()))
        .await
        .is_ok()
}

fn reply(request_id: &Value, name: &str, msg: Value) -> Value {
    json!({"request_id": request_id, "name": name, "msg": msg, "status": 2000})
}

fn success(request_id: &Value) -> Value {
    reply(request_id, "result", json!({"success": true}))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<TestServerState>) {
    let connection = state.connection_count.fetch_add(1, Ordering::Relaxed) + 1;
    let mut push_rx = state.push_tx.subscribe();

    let time_sync = json!({"name": "timeSync", "msg": SERVER_TIME_MILLIS});
    if !send_json(&mut socket, &time_sync).await {
        return;
    }

    loop {
        let message = tokio::select! {
            message = socket.recv() => message,
            pushed = push_rx.recv() => {
                if let Ok(frame) = pushed
                    && !send_json(&mut socket, &frame).await
                {
                    break;
                }
                continue;
            }
        };

        let Some(Ok(message)) = message else { break };
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
            continue;
        };

        state.frames.lock().await.push((connection, frame.clone()));

        let request_id = frame["request_id"].clone();
        let responses = match frame["name"].as_str() {
            Some("authenticate") => {
                let accepted = !state.reject_auth.load(Ordering::Relaxed)
                    && frame["msg"]["ssid"] == TEST_SSID;
                vec![reply(&request_id, "authenticated", json!(accepted))]
            }
            Some("unsubscribeMessage") if state.fail_unsubscribe.load(Ordering::Relaxed) => {
                vec![reply(
                    &request_id,
                    "result",
                    json!({"success": false, "reason": "unknown subscription"}),
                )]
            }
            Some("setOptions" | "subscribeMessage" | "unsubscribeMessage") => {
                vec![success(&request_id)]
            }
            Some("sendMessage") => {
                match handle_call(&state, &request_id, &frame["msg"]).await {
                    CallOutcome::Reply(responses) => responses,
                    CallOutcome::Drop => break,
                }
            }
            _ => Vec::new(),
        };

        for response in responses {
            if !send_json(&mut socket, &response).await {
                return;
            }
        }
    }
}

enum CallOutcome {
    Reply(Vec<Value>),
    Drop,
}

async fn handle_call(state: &TestServerState, request_id: &Value, msg: &Value) -> CallOutcome {
    let method = msg["name"].as_str().unwrap_or_default();
    let body = msg["body"].clone();

    let responses = match method {
        "test.silent" => Vec::new(),
        "test.drop" => return CallOutcome::Drop,
        "test.reject" => vec![json!({
            "request_id": request_id,
            "name": method,
            "msg": {"message": "invalid request"},
            "status": 4000,
        })],
        "test.unsuccessful" => vec![reply(
            request_id,
            "result",
            json!({"success": false, "reason": "not allowed"}),
        )],
        "test.deferred" => {
            // Held until a second deferred call arrives, then answered newest first.
            let mut deferred = state.deferred.lock().await;
            deferred.push((request_id.clone(), body));
            if deferred.len() < 2 {
                return CallOutcome::Reply(Vec::new());
            }
            deferred
                .drain(..)
                .rev()
                .map(|(id, body)| reply(&id, method, body))
                .collect()
        }
        "test.emit" => {
            let mut responses: Vec<Value> = (1..=2)
                .map(|seq| json!({"name": "tick", "microserviceName": "test", "msg": {"seq": seq}}))
                .collect();
            responses.push(reply(request_id, method, json!({"emitted": 2})));
            responses
        }
        "core.get-profile" => vec![reply(
            request_id,
            "profile",
            json!({"result": {"user_id": 42}}),
        )],
        "portfolio.get-positions" => {
            let positions = state.positions.lock().await;
            let limit = body["limit"].as_u64().unwrap_or(30);
            let echoed = state.echoed_limit.lock().await.unwrap_or(limit);
            let page = page(&positions, body["offset"].as_u64().unwrap_or(0), echoed);
            vec![reply(
                request_id,
                "positions",
                json!({"limit": echoed, "total": positions.len(), "positions": page}),
            )]
        }
        "portfolio.get-history-positions" => {
            let history = state.history.lock().await;
            let limit = body["limit"].as_u64().unwrap_or(30);
            let page = page(&history, body["offset"].as_u64().unwrap_or(0), limit);
            vec![reply(
                request_id,
                "history-positions",
                json!({"limit": limit, "positions": page}),
            )]
        }
        "portfolio.subscribe-positions" => vec![success(request_id)],
        _ => vec![reply(request_id, method, body)],
    };

    CallOutcome::Reply(responses)
}

fn page(rows: &[Value], offset: u64, limit: u64) -> Vec<Value> {
    rows.iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .cloned()
        .collect()
}

// ------------------------------------------------------------------------------------------------
// Fixtures
// ------------------------------------------------------------------------------------------------

pub async fn start_mock_server() -> (SocketAddr, Arc<TestServerState>) {
    let state = Arc::new(TestServerState::default());
    let router = Router::new()
        .route("/echo/websocket", get(handle_ws_upgrade))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (addr, state)
}

pub fn test_config(addr: SocketAddr) -> WsApiClientConfig {
    let mut config = WsApiClientConfig::new(format!("ws://{addr}/echo/websocket"), 189);
    config.connect_timeout_ms = 2_000;
    config.reconnect_delay_initial_ms = 20;
    config.reconnect_delay_max_ms = 200;
    config.reconnect_jitter_ms = 0;
    config
}

pub fn test_client(addr: SocketAddr) -> WsApiClient {
    WsApiClient::new(test_config(addr), Arc::new(SsidAuthMethod::new(TEST_SSID))).unwrap()
}

pub async fn connected_client() -> (WsApiClient, Arc<TestServerState>) {
    connected_client_with(|_| {}).await
}

pub async fn connected_client_with(
    customize: impl FnOnce(&mut WsApiClientConfig),
) -> (WsApiClient, Arc<TestServerState>) {
    let (addr, state) = start_mock_server().await;
    let mut config = test_config(addr);
    customize(&mut config);
    let client =
        WsApiClient::new(config, Arc::new(SsidAuthMethod::new(TEST_SSID))).unwrap();
    client.connect().await.unwrap();
    (client, state)
}

pub const WAIT: Duration = Duration::from_secs(5);

/// A `sendMessage` call with an arbitrary method and a raw JSON reply.
#[derive(Clone, Debug)]
pub struct Call {
    pub method: &'static str,
    pub body: Value,
}

impl Call {
    pub fn new(method: &'static str, body: Value) -> Self {
        Self { method, body }
    }
}

impl Request for Call {
    type Response = Value;

    fn message_body(&self) -> Value {
        json!({"name": self.method, "version": "1.0", "body": self.body})
    }
}

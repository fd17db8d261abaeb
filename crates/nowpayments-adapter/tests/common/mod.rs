/*
[INPUT]:  Test configuration and scripted server behaviour
[OUTPUT]: Shared test utilities: scripted REST executor, in-memory WebSocket server
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for nowpayments-adapter tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nowpayments_adapter::{
    ApiRequest,
    Connector,
    Execute,
    NowPaymentsError,
    Notification,
    RawResponse,
    Result,
    WsTransport,
    observer,
};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::Instant;
use wiremock::MockServer;

pub const TEST_API_KEY: &str = "test-api-key";

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// One scripted executor reply; cloned on every replay so the error kind
/// is preserved
#[derive(Debug, Clone)]
pub enum Outcome {
    Ok(Value),
    Api { status: u16, retry_after: Option<u64> },
    Network(&'static str),
    Validation(&'static str),
}

impl Outcome {
    fn produce(&self) -> Result<RawResponse> {
        match self {
            Outcome::Ok(body) => Ok(RawResponse {
                status: 200,
                body: body.clone(),
            }),
            Outcome::Api {
                status,
                retry_after,
            } => Err(NowPaymentsError::Api {
                status: *status,
                code: None,
                message: format!("status {status}"),
                retry_after: *retry_after,
            }),
            Outcome::Network(message) => Err(NowPaymentsError::network(*message)),
            Outcome::Validation(field) => Err(NowPaymentsError::validation(*field, "rejected")),
        }
    }
}

pub fn ok_response(body: Value) -> Outcome {
    Outcome::Ok(body)
}

pub fn api_error(status: u16) -> Outcome {
    Outcome::Api {
        status,
        retry_after: None,
    }
}

/// Executor that replays a fixed list of outcomes, then repeats the last one
#[derive(Debug)]
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<Outcome>>,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedExecutor {
    pub fn new(script: Vec<Outcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Time between consecutive attempts
    pub fn gaps(&self) -> Vec<Duration> {
        self.calls
            .lock()
            .unwrap()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }
}

#[async_trait]
impl Execute for ScriptedExecutor {
    async fn execute(&self, _request: &ApiRequest) -> Result<RawResponse> {
        self.calls.lock().unwrap().push(Instant::now());
        let mut script = self.script.lock().unwrap();
        let outcome = match script.len() {
            0 => return Err(NowPaymentsError::network("script exhausted")),
            1 => script[0].clone(),
            _ => script.pop_front().unwrap(),
        };
        outcome.produce()
    }
}

/// How the fake server answers the auth frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthReply {
    Ack,
    Reject,
    Silent,
}

struct ServerState {
    opens: usize,
    refuse: bool,
    auth: AuthReply,
    sent: Vec<Value>,
    inbound: Option<mpsc::UnboundedSender<Option<String>>>,
}

/// In-memory WebSocket server; also acts as the `Connector`
#[derive(Clone)]
pub struct FakeServer {
    state: Arc<Mutex<ServerState>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                opens: 0,
                refuse: false,
                auth: AuthReply::Ack,
                sent: Vec::new(),
                inbound: None,
            })),
        }
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.state.lock().unwrap().refuse = refuse;
    }

    pub fn set_auth_reply(&self, reply: AuthReply) {
        self.state.lock().unwrap().auth = reply;
    }

    /// Push a frame to the current connection
    pub fn push(&self, frame: Value) {
        if let Some(inbound) = &self.state.lock().unwrap().inbound {
            let _ = inbound.send(Some(frame.to_string()));
        }
    }

    pub fn push_raw(&self, raw: &str) {
        if let Some(inbound) = &self.state.lock().unwrap().inbound {
            let _ = inbound.send(Some(raw.to_string()));
        }
    }

    /// Drop the current connection from the server side
    pub fn drop_connection(&self) {
        if let Some(inbound) = self.state.lock().unwrap().inbound.take() {
            let _ = inbound.send(None);
        }
    }

    /// Every frame sent by the client, across connections
    pub fn sent(&self) -> Vec<Value> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_actions(&self, action: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|frame| frame["action"] == action)
            .collect()
    }

    pub fn subscribed_keys(&self) -> Vec<String> {
        self.sent_actions("subscribe")
            .iter()
            .filter_map(|frame| frame["key"].as_str().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Connector for FakeServer {
    async fn connect(&self, _url: &str) -> Result<Box<dyn WsTransport>> {
        let mut state = self.state.lock().unwrap();
        state.opens += 1;
        if state.refuse {
            return Err(NowPaymentsError::websocket("connection refused"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.inbound = Some(tx);
        Ok(Box::new(FakeTransport {
            server: self.clone(),
            pending: VecDeque::new(),
            rx,
        }))
    }
}

struct FakeTransport {
    server: FakeServer,
    pending: VecDeque<String>,
    rx: mpsc::UnboundedReceiver<Option<String>>,
}

#[async_trait]
impl WsTransport for FakeTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        let frame: Value = serde_json::from_str(&text)
            .map_err(|err| NowPaymentsError::websocket_with_source("client sent invalid json", err))?;
        let auth = {
            let mut state = self.server.state.lock().unwrap();
            state.sent.push(frame.clone());
            state.auth
        };
        if frame["action"] == "auth" {
            match auth {
                AuthReply::Ack => self.pending.push_back(json!({ "type": "auth_success" }).to_string()),
                AuthReply::Reject => self.pending.push_back(
                    json!({ "type": "auth_error", "payload": { "message": "invalid api key" } })
                        .to_string(),
                ),
                AuthReply::Silent => {}
            }
        }
        Ok(())
    }

    async fn next_text(&mut self) -> Option<Result<String>> {
        if let Some(frame) = self.pending.pop_front() {
            return Some(Ok(frame));
        }
        match self.rx.recv().await {
            Some(Some(frame)) => Some(Ok(frame)),
            Some(None) | None => None,
        }
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

/// Observer that forwards notification names into a channel
pub fn notification_log() -> (nowpayments_adapter::Observer, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let observer = observer(move |notification: &Notification| {
        let _ = tx.send(notification.name().to_string());
    });
    (observer, rx)
}

/// Wait until `name` is logged, returning every name seen on the way
pub async fn wait_for_notification(rx: &mut mpsc::UnboundedReceiver<String>, name: &str) -> Vec<String> {
    let mut seen = Vec::new();
    while let Some(next) = rx.recv().await {
        let done = next == name;
        seen.push(next);
        if done {
            break;
        }
    }
    seen
}

pub fn drain_notifications(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut seen = Vec::new();
    while let Ok(next) = rx.try_recv() {
        seen.push(next);
    }
    seen
}

pub fn payment_status_frame(payment_id: &str, status: &str) -> Value {
    json!({
        "type": "payment_status",
        "payload": { "payment_id": payment_id, "payment_status": status }
    })
}

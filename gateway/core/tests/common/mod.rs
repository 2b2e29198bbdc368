// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared fixtures: a scripted in-memory connector and an in-process
//! WebSocket gateway speaking the real handshake.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Semaphore};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use uuid::Uuid;

use switchboard_core::domain::errors::GatewayError;
use switchboard_core::domain::gateway::{ConnectionDescriptor, ConnectionState};
use switchboard_core::domain::rpc::RpcClient;
use switchboard_core::infrastructure::gateway::protocol::{
    GatewayFrame, RequestFrame, ResponseFrame, CHALLENGE_EVENT,
};
use switchboard_core::infrastructure::gateway::{GatewayConnector, ManagedConnection};

pub type Responder = Arc<dyn Fn(&str, &Value) -> Result<Value, GatewayError> + Send + Sync>;

pub fn echo_responder() -> Responder {
    Arc::new(|method: &str, params: &Value| Ok(json!({ "method": method, "params": params })))
}

// ---------------------------------------------------------------------------
// Scripted connector
// ---------------------------------------------------------------------------

pub struct FakeConnection {
    id: Uuid,
    state: AtomicU8,
    terminated: AtomicBool,
    responder: Responder,
    pub calls: Mutex<Vec<(String, Value)>>,
}

impl FakeConnection {
    /// Simulate the gateway dropping the socket.
    pub fn close(&self) {
        self.state.store(ConnectionState::Closed as u8, Ordering::SeqCst);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
    }
}

impl ManagedConnection for FakeConnection {
    fn connection_id(&self) -> Uuid {
        self.id
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
        self.state.store(ConnectionState::Closed as u8, Ordering::SeqCst);
    }
}

#[async_trait]
impl RpcClient for FakeConnection {
    async fn call(&self, method: &str, params: Value, _timeout: Duration) -> Result<Value, GatewayError> {
        if !self.state().is_open() {
            return Err(GatewayError::ConnectionClosed {
                connection_id: self.id,
            });
        }
        self.calls.lock().push((method.to_string(), params.clone()));
        (self.responder)(method, &params)
    }
}

pub struct FakeConnector {
    attempts: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    fail: AtomicBool,
    responder: Responder,
    created: Mutex<Vec<Arc<FakeConnection>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::with_responder(echo_responder())
    }

    pub fn with_responder(responder: Responder) -> Self {
        Self {
            attempts: AtomicUsize::new(0),
            gate: None,
            fail: AtomicBool::new(false),
            responder,
            created: Mutex::new(Vec::new()),
        }
    }

    /// Every connect waits for a permit from `gate`.
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Connect attempts started, including ones still waiting on the gate
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.created.lock().len()
    }

    pub fn created(&self) -> Vec<Arc<FakeConnection>> {
        self.created.lock().clone()
    }
}

#[async_trait]
impl GatewayConnector for FakeConnector {
    type Connection = FakeConnection;

    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Arc<FakeConnection>, GatewayError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| GatewayError::connection(&descriptor.url, e))?
                .forget();
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::connection(&descriptor.url, "connection refused"));
        }
        let connection = Arc::new(FakeConnection {
            id: Uuid::new_v4(),
            state: AtomicU8::new(ConnectionState::Open as u8),
            terminated: AtomicBool::new(false),
            responder: self.responder.clone(),
            calls: Mutex::new(Vec::new()),
        });
        self.created.lock().push(connection.clone());
        Ok(connection)
    }
}

// ---------------------------------------------------------------------------
// In-process WebSocket gateway
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    Accept,
    Reject,
    /// Upgrade the socket but never send the challenge
    Silent,
}

pub const TEST_NONCE: &str = "nonce-1";

pub struct FakeGateway {
    pub url: String,
    accepted: mpsc::UnboundedReceiver<ServerConn>,
}

impl FakeGateway {
    pub async fn start(mode: Handshake) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (tx, accepted) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Some(conn) = ServerConn::handshake(stream, mode).await {
                        let _ = tx.send(conn);
                    }
                });
            }
        });

        Self { url, accepted }
    }

    pub fn descriptor(&self) -> ConnectionDescriptor {
        ConnectionDescriptor::new(self.url.clone(), "gateway-token")
    }

    pub async fn next_connection(&mut self) -> ServerConn {
        tokio::time::timeout(Duration::from_secs(5), self.accepted.recv())
            .await
            .expect("no connection accepted")
            .expect("gateway stopped")
    }
}

/// Gateway side of one accepted, handshaken socket.
pub struct ServerConn {
    ws: WebSocketStream<TcpStream>,
    pub connect_params: Value,
}

impl ServerConn {
    async fn handshake(stream: TcpStream, mode: Handshake) -> Option<Self> {
        let mut ws = tokio_tungstenite::accept_async(stream).await.ok()?;
        if mode == Handshake::Silent {
            return Some(Self {
                ws,
                connect_params: Value::Null,
            });
        }
        let challenge = json!({
            "type": "event",
            "event": CHALLENGE_EVENT,
            "payload": { "nonce": TEST_NONCE, "ts": 1 },
        });
        ws.send(Message::Text(challenge.to_string())).await.ok()?;

        let mut conn = Self {
            ws,
            connect_params: Value::Null,
        };
        let request = conn.recv_request().await?;
        conn.connect_params = request.params.unwrap_or(Value::Null);

        let response = match mode {
            Handshake::Accept => ResponseFrame::ok(request.id, json!({ "protocol": 3 })),
            Handshake::Reject => ResponseFrame::err(request.id, "UNAUTHORIZED", "bad token"),
            Handshake::Silent => return None,
        };
        conn.send_frame(GatewayFrame::Response(response)).await;
        Some(conn)
    }

    pub async fn recv_request(&mut self) -> Option<RequestFrame> {
        while let Some(Ok(message)) = self.ws.next().await {
            if let Message::Text(text) = message {
                if let Some(GatewayFrame::Request(request)) = GatewayFrame::parse(&text) {
                    return Some(request);
                }
            }
        }
        None
    }

    pub async fn respond(&mut self, response: ResponseFrame) {
        self.send_frame(GatewayFrame::Response(response)).await;
    }

    pub async fn send_frame(&mut self, frame: GatewayFrame) {
        let text = frame.to_text().unwrap();
        self.ws.send(Message::Text(text)).await.unwrap();
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.ws.send(Message::Text(text.to_string())).await.unwrap();
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

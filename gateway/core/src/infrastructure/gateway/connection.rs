// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway Connection - correlated RPC over one WebSocket
//!
//! Each outbound call gets a fresh UUID correlation id and a pending entry
//! holding a oneshot responder. A background I/O task owns the socket, routes
//! `res` frames to their pending entry, re-broadcasts `event` frames, and
//! fails every outstanding call when the socket goes away.
//!
//! Pending entries are removed on the first of: response, timeout, caller
//! dropping the call future, connection shutdown. A late response finds
//! nothing to resolve and is dropped.

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::GatewayError;
use crate::domain::gateway::ConnectionState;
use crate::domain::rpc::RpcClient;
use crate::infrastructure::gateway::protocol::{ErrorShape, EventFrame, GatewayFrame, ResponseFrame};
use crate::infrastructure::gateway::transport::ManagedConnection;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Upper bound on sending the close frame to a peer that stopped reading
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type CallResult = Result<serde_json::Value, GatewayError>;
type PendingMap = Arc<Mutex<HashMap<String, PendingCall>>>;

/// One outstanding call awaiting its correlated response
struct PendingCall {
    method: String,
    params: serde_json::Value,
    deadline: Instant,
    responder: oneshot::Sender<CallResult>,
}

/// Snapshot of a pending call (for diagnostics)
#[derive(Debug, Clone)]
pub struct PendingCallInfo {
    pub id: String,
    pub method: String,
    pub params: serde_json::Value,
    pub deadline: Instant,
}

/// An open, handshaken connection to a gateway.
pub struct GatewayConnection {
    id: Uuid,
    url: String,
    state: Arc<AtomicU8>,
    outbound: mpsc::UnboundedSender<Message>,
    pending: PendingMap,
    events: broadcast::Sender<EventFrame>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for GatewayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConnection")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl GatewayConnection {
    /// Take ownership of a handshaken socket and start its I/O task.
    pub(crate) fn spawn(url: impl Into<String>, ws: WsStream) -> Arc<Self> {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let connection = Arc::new(Self {
            id: Uuid::new_v4(),
            url: url.into(),
            state: Arc::new(AtomicU8::new(ConnectionState::Open as u8)),
            outbound,
            pending: Arc::new(Mutex::new(HashMap::new())),
            events,
            shutdown: CancellationToken::new(),
        });

        let io = IoTask {
            connection_id: connection.id,
            state: connection.state.clone(),
            pending: connection.pending.clone(),
            events: connection.events.clone(),
            shutdown: connection.shutdown.clone(),
        };
        tokio::spawn(io.run(ws, outbound_rx));

        info!(connection_id = %connection.id, url = %connection.url, "Gateway connection open");
        connection
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Subscribe to unsolicited gateway events
    pub fn subscribe_events(&self) -> broadcast::Receiver<EventFrame> {
        self.events.subscribe()
    }

    /// Number of calls currently awaiting a response
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn pending_calls(&self) -> Vec<PendingCallInfo> {
        self.pending
            .lock()
            .iter()
            .map(|(id, call)| PendingCallInfo {
                id: id.clone(),
                method: call.method.clone(),
                params: call.params.clone(),
                deadline: call.deadline,
            })
            .collect()
    }

    /// Issue one correlated call and wait for its response or `timeout`.
    pub async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
        timeout: Duration,
    ) -> CallResult {
        if !self.state().is_open() {
            return Err(GatewayError::ConnectionClosed {
                connection_id: self.id,
            });
        }

        let id = Uuid::new_v4().to_string();
        let text = GatewayFrame::request(id.clone(), method, params.clone()).to_text()?;
        let (tx, rx) = oneshot::channel();

        self.pending.lock().insert(
            id.clone(),
            PendingCall {
                method: method.to_string(),
                params,
                deadline: Instant::now() + timeout,
                responder: tx,
            },
        );
        let _slot = PendingSlot {
            pending: &self.pending,
            id: id.clone(),
        };

        // The I/O task may have drained `pending` between the check above and the insert
        if !self.state().is_open() {
            return Err(GatewayError::ConnectionClosed {
                connection_id: self.id,
            });
        }

        debug!(connection_id = %self.id, call_id = %id, method = %method, "Sending RPC call");

        if self.outbound.send(Message::Text(text)).is_err() {
            return Err(GatewayError::ConnectionClosed {
                connection_id: self.id,
            });
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(GatewayError::ConnectionClosed {
                connection_id: self.id,
            }),
            Err(_) => {
                warn!(
                    connection_id = %self.id,
                    call_id = %id,
                    method = %method,
                    timeout_ms = timeout.as_millis() as u64,
                    "RPC call timed out"
                );
                Err(GatewayError::RpcTimeout {
                    method: method.to_string(),
                    id,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Close the socket and fail any outstanding calls.
    pub fn terminate(&self) {
        let _ = self.state.compare_exchange(
            ConnectionState::Open as u8,
            ConnectionState::Closing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.shutdown.cancel();
    }
}

impl Drop for GatewayConnection {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl RpcClient for GatewayConnection {
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
        timeout: Duration,
    ) -> CallResult {
        GatewayConnection::call(self, method, params, timeout).await
    }
}

impl ManagedConnection for GatewayConnection {
    fn connection_id(&self) -> Uuid {
        self.id
    }

    fn state(&self) -> ConnectionState {
        GatewayConnection::state(self)
    }

    fn terminate(&self) {
        GatewayConnection::terminate(self)
    }
}

/// Removes a pending entry when the call returns or its future is dropped.
struct PendingSlot<'a> {
    pending: &'a PendingMap,
    id: String,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

struct IoTask {
    connection_id: Uuid,
    state: Arc<AtomicU8>,
    pending: PendingMap,
    events: broadcast::Sender<EventFrame>,
    shutdown: CancellationToken,
}

impl IoTask {
    async fn run(self, ws: WsStream, mut outbound: mpsc::UnboundedReceiver<Message>) {
        let (mut sink, mut stream) = ws.split();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.close(&mut sink).await;
                    break;
                }
                Some(message) = outbound.recv() => {
                    // A peer that stops reading must not block terminate
                    let sent = tokio::select! {
                        sent = sink.send(message) => Some(sent),
                        _ = self.shutdown.cancelled() => None,
                    };
                    let Some(sent) = sent else {
                        self.close(&mut sink).await;
                        break;
                    };
                    if let Err(e) = sent {
                        warn!(connection_id = %self.connection_id, error = %e, "Failed to write to gateway socket");
                        break;
                    }
                }
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.dispatch(&text),
                    Some(Ok(Message::Close(frame))) => {
                        debug!(connection_id = %self.connection_id, frame = ?frame, "Gateway closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(connection_id = %self.connection_id, error = %e, "Gateway socket error");
                        break;
                    }
                    None => break,
                },
            }
        }

        self.state.store(ConnectionState::Closed as u8, Ordering::Release);
        let orphaned: Vec<PendingCall> = self.pending.lock().drain().map(|(_, call)| call).collect();
        if !orphaned.is_empty() {
            warn!(
                connection_id = %self.connection_id,
                count = orphaned.len(),
                "Failing pending calls on closed connection"
            );
        }
        for call in orphaned {
            let _ = call.responder.send(Err(GatewayError::ConnectionClosed {
                connection_id: self.connection_id,
            }));
        }
        info!(connection_id = %self.connection_id, "Gateway connection closed");
    }

    async fn close(&self, sink: &mut SplitSink<WsStream, Message>) {
        self.state.store(ConnectionState::Closing as u8, Ordering::Release);
        let closed = tokio::time::timeout(CLOSE_TIMEOUT, async {
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        })
        .await;
        if closed.is_err() {
            warn!(connection_id = %self.connection_id, "Gateway did not accept close frame in time, dropping socket");
        } else {
            debug!(connection_id = %self.connection_id, "Gateway connection terminated");
        }
    }

    fn dispatch(&self, text: &str) {
        match GatewayFrame::parse(text) {
            Some(GatewayFrame::Response(response)) => self.resolve(response),
            Some(GatewayFrame::Event(event)) => {
                // No subscribers is fine
                let _ = self.events.send(event);
            }
            Some(GatewayFrame::Request(request)) => {
                debug!(connection_id = %self.connection_id, method = %request.method, "Ignoring gateway-initiated request");
            }
            None => {
                debug!(connection_id = %self.connection_id, "Ignoring unparseable frame");
            }
        }
    }

    fn resolve(&self, response: ResponseFrame) {
        let Some(call) = self.pending.lock().remove(&response.id) else {
            debug!(connection_id = %self.connection_id, call_id = %response.id, "No pending call for response");
            return;
        };

        let result = if response.ok {
            Ok(response.payload.unwrap_or(serde_json::Value::Null))
        } else {
            let error = response.error.unwrap_or_else(|| ErrorShape {
                code: "UNKNOWN".to_string(),
                message: "gateway returned ok=false without an error".to_string(),
                details: None,
            });
            Err(GatewayError::Rpc {
                method: call.method,
                code: error.code,
                message: error.message,
                details: error.details,
            })
        };
        let _ = call.responder.send(result);
    }
}

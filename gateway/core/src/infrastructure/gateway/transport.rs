// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway Transport
//!
//! Opens the WebSocket to a gateway and runs the `connect` handshake before
//! handing the socket to a [`GatewayConnection`].
//!
//! # Handshake
//!
//! 1. Gateway pushes `connect.challenge` with a nonce
//! 2. Client sends a `connect` request: protocol range, client identity,
//!    auth token, and (unless device pairing is disabled) a device block
//!    echoing the nonce
//! 3. Gateway answers `ok: true`; anything else is a connection error
//!
//! The whole sequence, including TCP/TLS setup, runs under the connect timeout.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::Connector;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::client_config::ClientIdentity;
use crate::domain::errors::GatewayError;
use crate::domain::gateway::{ConnectionDescriptor, ConnectionState};
use crate::infrastructure::gateway::connection::{GatewayConnection, WsStream};
use crate::infrastructure::gateway::protocol::{ConnectParams, GatewayFrame, CONNECT_METHOD};
use crate::infrastructure::gateway::tls;

/// A live connection the pool can inspect and tear down.
pub trait ManagedConnection: Send + Sync + 'static {
    fn connection_id(&self) -> Uuid;

    fn state(&self) -> ConnectionState;

    /// Force-close. Idempotent; state leaves `Open` before this returns.
    fn terminate(&self);
}

/// Establishes new gateway connections.
#[async_trait]
pub trait GatewayConnector: Send + Sync + 'static {
    type Connection: ManagedConnection;

    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Arc<Self::Connection>, GatewayError>;
}

/// Production connector: WebSocket + rustls + `connect` handshake.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    identity: ClientIdentity,
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(identity: ClientIdentity, connect_timeout: Duration) -> Self {
        Self {
            identity,
            connect_timeout,
        }
    }

    async fn open(&self, url: &str, descriptor: &ConnectionDescriptor) -> Result<WsStream, GatewayError> {
        let parsed = url::Url::parse(url).map_err(|e| GatewayError::connection(url, e))?;
        if parsed.host_str().is_none() {
            return Err(GatewayError::connection(url, "missing host"));
        }
        let request = url
            .into_client_request()
            .map_err(|e| GatewayError::connection(url, e))?;
        let tls = tls::client_config(descriptor.allow_insecure_tls)
            .map_err(|e| GatewayError::connection(url, e))?;

        let (mut ws, _) = tokio_tungstenite::connect_async_tls_with_config(
            request,
            None,
            true,
            Some(Connector::Rustls(tls)),
        )
        .await
        .map_err(|e| GatewayError::connection(url, e))?;

        self.handshake(&mut ws, url, descriptor).await?;
        Ok(ws)
    }

    async fn handshake(
        &self,
        ws: &mut WsStream,
        url: &str,
        descriptor: &ConnectionDescriptor,
    ) -> Result<(), GatewayError> {
        let nonce = loop {
            match next_frame(ws, url).await? {
                GatewayFrame::Event(event) => {
                    if let Some(nonce) = event.challenge_nonce() {
                        break nonce.to_string();
                    }
                    debug!(url = %url, event = %event.event, "Skipping event before challenge");
                }
                other => debug!(url = %url, frame = ?other, "Skipping frame before challenge"),
            }
        };

        let request_id = Uuid::new_v4().to_string();
        let params = ConnectParams::new(&self.identity, descriptor, &nonce);
        let text = GatewayFrame::request(request_id.clone(), CONNECT_METHOD, serde_json::to_value(params)?)
            .to_text()?;
        ws.send(Message::Text(text))
            .await
            .map_err(|e| GatewayError::connection(url, e))?;

        loop {
            match next_frame(ws, url).await? {
                GatewayFrame::Response(res) if res.id == request_id => {
                    if res.ok {
                        return Ok(());
                    }
                    let reason = res
                        .error
                        .map(|e| format!("handshake rejected: [{}] {}", e.code, e.message))
                        .unwrap_or_else(|| "handshake rejected".to_string());
                    return Err(GatewayError::connection(url, reason));
                }
                other => debug!(url = %url, frame = ?other, "Skipping frame during handshake"),
            }
        }
    }
}

#[async_trait]
impl GatewayConnector for WebSocketConnector {
    type Connection = GatewayConnection;

    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Arc<GatewayConnection>, GatewayError> {
        let url = normalize_url(&descriptor.url);
        debug!(url = %url, insecure_tls = descriptor.allow_insecure_tls, "Connecting to gateway");

        match tokio::time::timeout(self.connect_timeout, self.open(&url, descriptor)).await {
            Ok(Ok(ws)) => Ok(GatewayConnection::spawn(url, ws)),
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "Gateway connect failed");
                Err(e)
            }
            Err(_) => {
                warn!(url = %url, timeout_ms = self.connect_timeout.as_millis() as u64, "Gateway connect timed out");
                Err(GatewayError::connection(
                    url,
                    format!("handshake not completed within {}ms", self.connect_timeout.as_millis()),
                ))
            }
        }
    }
}

/// Read the next protocol frame, skipping non-text and unparseable messages.
async fn next_frame(ws: &mut WsStream, url: &str) -> Result<GatewayFrame, GatewayError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                if let Some(frame) = GatewayFrame::parse(&text) {
                    return Ok(frame);
                }
                debug!(url = %url, "Ignoring unparseable frame during handshake");
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(GatewayError::connection(url, "closed during handshake"));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(GatewayError::connection(url, e)),
        }
    }
}

/// Ensure the address has a WebSocket scheme
pub fn normalize_url(address: &str) -> String {
    let address = address.trim();
    if address.starts_with("ws://") || address.starts_with("wss://") {
        address.to_string()
    } else if let Some(rest) = address.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = address.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        format!("ws://{}", address)
    }
}

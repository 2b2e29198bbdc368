// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `wss://` connections against an in-process gateway with a self-signed certificate.

use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::tungstenite::Message;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use switchboard_core::domain::client_config::ClientIdentity;
use switchboard_core::domain::errors::GatewayError;
use switchboard_core::domain::gateway::{ConnectionDescriptor, ConnectionState};
use switchboard_core::infrastructure::gateway::protocol::{GatewayFrame, ResponseFrame, CHALLENGE_EVENT};
use switchboard_core::infrastructure::gateway::{GatewayConnector, WebSocketConnector};

fn self_signed_acceptor() -> TlsAcceptor {
    let certified = rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string()]).unwrap();
    let cert: CertificateDer<'static> = certified.cert.der().clone();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

/// Serve one TLS client: handshake, then answer every request with its method name.
async fn start_tls_gateway() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("wss://{}", listener.local_addr().unwrap());
    let acceptor = self_signed_acceptor();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let Ok(tls) = acceptor.accept(stream).await else {
                    return;
                };
                let Ok(mut ws) = tokio_tungstenite::accept_async(tls).await else {
                    return;
                };
                let challenge = json!({
                    "type": "event",
                    "event": CHALLENGE_EVENT,
                    "payload": { "nonce": "tls-nonce", "ts": 1 },
                });
                if ws.send(Message::Text(challenge.to_string())).await.is_err() {
                    return;
                }
                while let Some(Ok(message)) = ws.next().await {
                    let Message::Text(text) = message else { continue };
                    let Some(GatewayFrame::Request(request)) = GatewayFrame::parse(&text) else {
                        continue;
                    };
                    let payload = json!({ "answeredMethod": request.method });
                    let response = GatewayFrame::Response(ResponseFrame::ok(request.id, payload));
                    let text = response.to_text().unwrap();
                    if ws.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    url
}

fn connector() -> WebSocketConnector {
    WebSocketConnector::new(ClientIdentity::default(), Duration::from_secs(5))
}

#[tokio::test]
async fn test_insecure_tls_accepts_self_signed_gateway() {
    let url = start_tls_gateway().await;
    let descriptor = ConnectionDescriptor::new(url, "gateway-token").with_insecure_tls(true);

    let connection = connector().connect(&descriptor).await.unwrap();
    assert_eq!(connection.state(), ConnectionState::Open);

    let payload = connection
        .call("sessions.list", json!({}), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(payload["answeredMethod"], "sessions.list");
}

#[tokio::test]
async fn test_verified_tls_rejects_self_signed_gateway() {
    let url = start_tls_gateway().await;
    let descriptor = ConnectionDescriptor::new(url, "gateway-token");

    let err = connector().connect(&descriptor).await.unwrap_err();
    assert!(matches!(err, GatewayError::Connection { .. }), "{:?}", err);
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Health probe over a throwaway connection.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::gateway::{ConnectionDescriptor, PingResult};
use crate::domain::rpc::RpcClient;
use crate::infrastructure::gateway::transport::{GatewayConnector, ManagedConnection};

/// Lightest round-trip the gateway answers
pub const PING_METHOD: &str = "health";

/// Connect, issue one `health` call, and tear the connection down.
///
/// Never fails: every error ends up in the returned [`PingResult`]. Latency
/// covers connect, handshake and the call itself. The connection is not
/// pooled and is terminated whatever the outcome.
pub async fn ping<C>(connector: &C, descriptor: &ConnectionDescriptor, timeout: Duration) -> PingResult
where
    C: GatewayConnector,
    C::Connection: RpcClient,
{
    let started = Instant::now();

    let connection = match tokio::time::timeout(timeout, connector.connect(descriptor)).await {
        Ok(Ok(connection)) => connection,
        Ok(Err(e)) => {
            warn!(url = %descriptor.url, error = %e, "Ping connect failed");
            return PingResult::failed(e.to_string());
        }
        Err(_) => {
            warn!(url = %descriptor.url, "Ping connect timed out");
            return PingResult::failed(format!("connect timed out after {}ms", timeout.as_millis()));
        }
    };

    let remaining = timeout.saturating_sub(started.elapsed());
    let outcome = connection
        .call(PING_METHOD, serde_json::Value::Null, remaining)
        .await;
    connection.terminate();

    match outcome {
        Ok(_) => {
            let latency_ms = started.elapsed().as_millis() as u64;
            debug!(url = %descriptor.url, latency_ms, "Ping succeeded");
            PingResult::ok(latency_ms)
        }
        Err(e) => {
            warn!(url = %descriptor.url, error = %e, "Ping call failed");
            PingResult::failed(e.to_string())
        }
    }
}

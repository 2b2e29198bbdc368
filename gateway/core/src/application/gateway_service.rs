// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway Operations
//!
//! Each operation resolves the gateway's descriptor, runs one
//! acquire → call(s) → release cycle through the pool, and returns the
//! gateway payload. Release is tied to a drop guard, so it happens on
//! success, on error and when the caller's future is dropped mid-call.
//!
//! A call that times out leaves its connection in an unknown state; it is
//! terminated before release so the pool discards it.

use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::provisioning::AgentProvisioner;
use crate::domain::client_config::TimeoutConfig;
use crate::domain::errors::GatewayError;
use crate::domain::gateway::{CacheKey, ConnectionDescriptor, GatewayHealth, GatewayId, PingResult};
use crate::domain::provisioning::ProvisioningContext;
use crate::domain::repository::{GatewayDirectory, GatewayHealthRepository};
use crate::domain::rpc::RpcClient;
use crate::infrastructure::gateway::pool::ConnectionPool;
use crate::infrastructure::gateway::probe;
use crate::infrastructure::gateway::transport::{GatewayConnector, ManagedConnection};

pub const SESSIONS_LIST_METHOD: &str = "sessions.list";
pub const CHAT_HISTORY_METHOD: &str = "chat.history";
pub const CHAT_SEND_METHOD: &str = "chat.send";

pub struct GatewayService<C: GatewayConnector> {
    pool: Arc<ConnectionPool<C>>,
    directory: Arc<dyn GatewayDirectory>,
    health: Arc<dyn GatewayHealthRepository>,
    provisioner: AgentProvisioner,
    timeouts: TimeoutConfig,
}

impl<C> GatewayService<C>
where
    C: GatewayConnector,
    C::Connection: RpcClient,
{
    pub fn new(
        pool: Arc<ConnectionPool<C>>,
        directory: Arc<dyn GatewayDirectory>,
        health: Arc<dyn GatewayHealthRepository>,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            pool,
            directory,
            health,
            provisioner: AgentProvisioner::new(timeouts.provisioning_step),
            timeouts,
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool<C>> {
        &self.pool
    }

    pub async fn list_sessions(&self, gateway_id: GatewayId) -> Result<Value, GatewayError> {
        let timeout = self.timeouts.call;
        self.with_connection(gateway_id, |conn| async move {
            conn.call(SESSIONS_LIST_METHOD, json!({}), timeout).await
        })
        .await
    }

    pub async fn fetch_history(
        &self,
        gateway_id: GatewayId,
        session_key: &str,
        limit: Option<u32>,
    ) -> Result<Value, GatewayError> {
        let timeout = self.timeouts.call;
        let mut params = json!({ "sessionKey": session_key });
        if let Some(limit) = limit {
            params["limit"] = json!(limit);
        }
        self.with_connection(gateway_id, |conn| async move {
            conn.call(CHAT_HISTORY_METHOD, params, timeout).await
        })
        .await
    }

    /// Send a chat message. Each send carries a fresh idempotency key.
    pub async fn send_message(
        &self,
        gateway_id: GatewayId,
        session_key: &str,
        message: &str,
    ) -> Result<Value, GatewayError> {
        let timeout = self.timeouts.call;
        let params = json!({
            "sessionKey": session_key,
            "message": message,
            "idempotencyKey": Uuid::new_v4().to_string(),
        });
        self.with_connection(gateway_id, |conn| async move {
            conn.call(CHAT_SEND_METHOD, params, timeout).await
        })
        .await
    }

    /// Run the provisioning workflow over one pooled connection.
    pub async fn provision_agent(&self, ctx: &ProvisioningContext) -> Result<String, GatewayError> {
        let provisioner = &self.provisioner;
        self.with_connection(ctx.gateway_id, |conn| async move {
            provisioner
                .provision(conn.as_ref(), ctx)
                .await
                .map_err(GatewayError::from)
        })
        .await
    }

    /// Probe the gateway on a throwaway connection and record the result.
    pub async fn check_status(&self, gateway_id: GatewayId) -> Result<GatewayHealth, GatewayError> {
        let descriptor = self.descriptor(gateway_id).await?;
        let ping = probe::ping(self.pool.connector(), &descriptor, self.timeouts.ping).await;
        let health = GatewayHealth::from_ping(gateway_id, ping);
        self.health.record(&health).await?;
        info!(
            gateway_id = %gateway_id,
            healthy = health.is_healthy,
            latency_ms = ?health.latency_ms,
            "Recorded gateway health"
        );
        Ok(health)
    }

    /// Check a candidate descriptor before it is saved anywhere.
    pub async fn validate_connection(&self, descriptor: &ConnectionDescriptor) -> PingResult {
        probe::ping(self.pool.connector(), descriptor, self.timeouts.ping).await
    }

    pub fn shutdown(&self) {
        self.pool.clear();
    }

    async fn descriptor(&self, gateway_id: GatewayId) -> Result<ConnectionDescriptor, GatewayError> {
        self.directory
            .find_descriptor(gateway_id)
            .await?
            .ok_or(GatewayError::GatewayNotFound(gateway_id))
    }

    async fn with_connection<T, F, Fut>(&self, gateway_id: GatewayId, op: F) -> Result<T, GatewayError>
    where
        F: FnOnce(Arc<C::Connection>) -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let descriptor = self.descriptor(gateway_id).await?;
        let lease = self.pool.acquire(gateway_id, &descriptor).await?;
        let guard = LeaseGuard {
            pool: &self.pool,
            cache_key: lease.cache_key,
            connection: lease.connection,
        };

        let result = op(guard.connection.clone()).await;
        if let Err(e) = &result {
            if e.is_timeout() {
                debug!(
                    gateway_id = %gateway_id,
                    connection_id = %guard.connection.connection_id(),
                    "Terminating connection after timeout"
                );
                guard.connection.terminate();
            }
        }
        result
    }
}

/// Releases a leased connection back to the pool when dropped.
struct LeaseGuard<'a, C: GatewayConnector> {
    pool: &'a ConnectionPool<C>,
    cache_key: CacheKey,
    connection: Arc<C::Connection>,
}

impl<C: GatewayConnector> Drop for LeaseGuard<'_, C> {
    fn drop(&mut self) {
        self.pool.release(&self.connection, &self.cache_key);
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent Provisioning Workflow
//!
//! Registers an agent's session on a gateway with a fixed sequence of seven
//! calls over one connection:
//!
//! | # | Method | Produces |
//! |---|--------|----------|
//! | 1 | `agents.pair` | `pairingToken` |
//! | 2 | `agents.identity.set` | gateway-side `agentId` |
//! | 3 | `agents.peers.sync` | |
//! | 4 | `sessions.create` | session `key` |
//! | 5 | `agents.callback.set` | |
//! | 6 | `sessions.patch` | |
//! | 7 | `sessions.get` | confirmation |
//!
//! The first failing step aborts the run. Nothing is rolled back; gateways
//! accept re-provisioning of the same agent.
//!
//! The workflow never touches the pool. Callers acquire a connection, pass it
//! in, and release it afterwards.

use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::errors::{GatewayError, ProvisionError};
use crate::domain::provisioning::ProvisioningContext;
use crate::domain::rpc::RpcClient;

pub const PAIR_METHOD: &str = "agents.pair";
pub const IDENTITY_METHOD: &str = "agents.identity.set";
pub const PEERS_METHOD: &str = "agents.peers.sync";
pub const SESSION_CREATE_METHOD: &str = "sessions.create";
pub const CALLBACK_METHOD: &str = "agents.callback.set";
pub const SESSION_PATCH_METHOD: &str = "sessions.patch";
pub const SESSION_GET_METHOD: &str = "sessions.get";

/// Method names in execution order
pub const PROVISIONING_STEPS: [&str; 7] = [
    PAIR_METHOD,
    IDENTITY_METHOD,
    PEERS_METHOD,
    SESSION_CREATE_METHOD,
    CALLBACK_METHOD,
    SESSION_PATCH_METHOD,
    SESSION_GET_METHOD,
];

#[derive(Debug, Clone)]
pub struct AgentProvisioner {
    step_timeout: Duration,
}

impl AgentProvisioner {
    pub fn new(step_timeout: Duration) -> Self {
        Self { step_timeout }
    }

    /// Run all seven steps; returns the confirmed session key.
    pub async fn provision<R>(
        &self,
        client: &R,
        ctx: &ProvisioningContext,
    ) -> Result<String, ProvisionError>
    where
        R: RpcClient + ?Sized,
    {
        let mut run = Run {
            client,
            timeout: self.step_timeout,
            step: 0,
        };
        let agent_id = ctx.agent.id.to_string();
        let workspace_id = ctx.workspace_id.to_string();
        let requested_key = ctx.session_key();

        info!(
            agent_id = %agent_id,
            gateway_id = %ctx.gateway_id,
            session_key = %requested_key,
            "Provisioning agent on gateway"
        );

        let paired = run
            .step(
                PAIR_METHOD,
                json!({
                    "agentId": agent_id,
                    "name": ctx.agent.name,
                    "workspaceId": workspace_id,
                }),
            )
            .await?;
        let pairing_token = run.require_str(&paired, "pairingToken")?;

        let identity = run
            .step(
                IDENTITY_METHOD,
                json!({
                    "pairingToken": pairing_token,
                    "agent": { "id": agent_id, "name": ctx.agent.name },
                    "workspaceId": workspace_id,
                }),
            )
            .await?;
        let gateway_agent_id = run.require_str(&identity, "agentId")?;

        let peers: Vec<Value> = ctx
            .peers
            .iter()
            .map(|peer| json!({ "id": peer.id.to_string(), "name": peer.name }))
            .collect();
        run.step(
            PEERS_METHOD,
            json!({ "agentId": gateway_agent_id, "peers": peers }),
        )
        .await?;

        let created = run
            .step(
                SESSION_CREATE_METHOD,
                json!({
                    "agentId": gateway_agent_id,
                    "key": requested_key,
                    "label": ctx.agent.name,
                }),
            )
            .await?;
        let session_key = created
            .get("key")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(requested_key);

        run.step(
            CALLBACK_METHOD,
            json!({
                "agentId": gateway_agent_id,
                "url": ctx.callback_url(),
                "token": ctx.auth_token,
            }),
        )
        .await?;

        run.step(
            SESSION_PATCH_METHOD,
            json!({
                "key": session_key,
                "agentId": gateway_agent_id,
                "metadata": {
                    "agentId": agent_id,
                    "workspaceId": workspace_id,
                    "gatewayId": ctx.gateway_id.to_string(),
                },
            }),
        )
        .await?;

        let confirmed = run
            .step(SESSION_GET_METHOD, json!({ "key": session_key }))
            .await?;
        match confirmed.get("key").and_then(Value::as_str) {
            Some(key) if key == session_key => {}
            other => {
                return Err(run.fail(GatewayError::Protocol(format!(
                    "session {} not confirmed (gateway returned {:?})",
                    session_key, other
                ))));
            }
        }

        info!(
            agent_id = %agent_id,
            gateway_id = %ctx.gateway_id,
            session_key = %session_key,
            "Agent provisioned"
        );
        Ok(session_key)
    }
}

/// Tracks the current step so every error is tagged with it.
struct Run<'a, R: ?Sized> {
    client: &'a R,
    timeout: Duration,
    step: usize,
}

impl<R: RpcClient + ?Sized> Run<'_, R> {
    async fn step(&mut self, method: &'static str, params: Value) -> Result<Value, ProvisionError> {
        self.step += 1;
        debug!(step = self.step, method, "Provisioning step");
        self.client
            .call(method, params, self.timeout)
            .await
            .map_err(|source| self.fail(source))
    }

    fn require_str(&self, payload: &Value, field: &str) -> Result<String, ProvisionError> {
        payload
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                self.fail(GatewayError::Protocol(format!(
                    "{} response is missing {}",
                    self.method(),
                    field
                )))
            })
    }

    fn method(&self) -> &'static str {
        PROVISIONING_STEPS[self.step.saturating_sub(1)]
    }

    fn fail(&self, source: GatewayError) -> ProvisionError {
        let method = self.method();
        warn!(step = self.step, method, error = %source, "Provisioning step failed");
        ProvisionError {
            step: self.step,
            method,
            source,
        }
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Provisioning Context
//!
//! Call-scoped inputs for registering an agent session on a gateway. Nothing
//! here is persisted; the context lives only for one provisioning run.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::gateway::GatewayId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceId(pub Uuid);

impl WorkspaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for WorkspaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Minimal agent identity as seen by a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRef {
    pub id: AgentId,
    pub name: String,
}

impl AgentRef {
    pub fn new(id: AgentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Inputs for one provisioning run.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProvisioningContext {
    pub agent: AgentRef,
    pub workspace_id: WorkspaceId,
    pub gateway_id: GatewayId,
    /// Other agents in the workspace, synced to the gateway as peer context
    #[serde(default)]
    pub peers: Vec<AgentRef>,
    /// Base URL the gateway calls back into
    pub base_url: String,
    /// Token the gateway presents on callbacks
    pub auth_token: String,
}

impl ProvisioningContext {
    pub fn session_key(&self) -> String {
        session_key(&self.agent, self.workspace_id, self.gateway_id)
    }

    /// Callback endpoint registered for the agent, without doubled slashes.
    pub fn callback_url(&self) -> String {
        format!(
            "{}/api/v1/agents/{}/callback",
            self.base_url.trim_end_matches('/'),
            self.agent.id
        )
    }
}

impl fmt::Debug for ProvisioningContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningContext")
            .field("agent", &self.agent)
            .field("workspace_id", &self.workspace_id)
            .field("gateway_id", &self.gateway_id)
            .field("peers", &self.peers.len())
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Address of the agent's session on a gateway.
///
/// Pure: callers that only need to talk to an already-provisioned session
/// derive the same key without re-running provisioning.
pub fn session_key(agent: &AgentRef, workspace_id: WorkspaceId, gateway_id: GatewayId) -> String {
    format!(
        "agent:{}:workspace:{}:gateway:{}",
        agent.id, workspace_id, gateway_id
    )
}

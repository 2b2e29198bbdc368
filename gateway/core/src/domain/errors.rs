// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway client error taxonomy.
//!
//! | Variant | Raised by | Meaning |
//! |---------|-----------|---------|
//! | `Connection` | transport | socket or handshake did not complete |
//! | `RpcTimeout` | call layer | no correlated response before the deadline |
//! | `Rpc` | call layer | gateway answered `ok: false` |
//! | `ConnectionClosed` | call layer | connection went away under a call |
//! | `Provisioning` | provisioning workflow | a numbered step failed |
//!
//! Capacity pressure in the pool is never an error: the oldest idle entry is
//! evicted instead.

use crate::domain::gateway::GatewayId;
use crate::domain::repository::RepositoryError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Failed to connect to gateway {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("RPC call {method} (id {id}) timed out after {timeout_ms}ms")]
    RpcTimeout {
        method: String,
        id: String,
        timeout_ms: u64,
    },

    #[error("RPC call {method} failed: [{code}] {message}")]
    Rpc {
        method: String,
        code: String,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Gateway connection {connection_id} is closed")]
    ConnectionClosed { connection_id: Uuid },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Gateway not found: {0}")]
    GatewayNotFound(GatewayId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Provisioning(Box<ProvisionError>),
}

impl GatewayError {
    pub fn connection(url: impl Into<String>, reason: impl ToString) -> Self {
        GatewayError::Connection {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Timeouts leave the connection suspect; callers terminate it before release.
    pub fn is_timeout(&self) -> bool {
        match self {
            GatewayError::RpcTimeout { .. } => true,
            GatewayError::Provisioning(err) => err.source.is_timeout(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Protocol(err.to_string())
    }
}

impl From<ProvisionError> for GatewayError {
    fn from(err: ProvisionError) -> Self {
        GatewayError::Provisioning(Box::new(err))
    }
}

/// A provisioning step failed. `source` is the step's error, unmodified.
#[derive(Debug, thiserror::Error)]
#[error("Provisioning step {step} ({method}) failed: {source}")]
pub struct ProvisionError {
    /// 1-based position in the step sequence
    pub step: usize,
    pub method: &'static str,
    #[source]
    pub source: GatewayError,
}

impl ProvisionError {
    pub fn into_source(self) -> GatewayError {
        self.source
    }
}

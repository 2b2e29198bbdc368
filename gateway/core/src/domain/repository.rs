// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Collaborator Interfaces
//!
//! The gateway client does not own gateway records. It reads connection
//! descriptors from, and writes probe results back to, the surrounding
//! control plane through these two contracts.
//!
//! | Trait | Direction | Implementations |
//! |-------|-----------|----------------|
//! | `GatewayDirectory` | read | `InMemoryGatewayDirectory` |
//! | `GatewayHealthRepository` | write | `InMemoryGatewayHealthRepository` |

use async_trait::async_trait;

use crate::domain::gateway::{ConnectionDescriptor, GatewayHealth, GatewayId};

/// Gateway directory lookup
#[async_trait]
pub trait GatewayDirectory: Send + Sync {
    /// Resolve how to connect to a gateway; `None` when it is unknown
    async fn find_descriptor(
        &self,
        gateway_id: GatewayId,
    ) -> Result<Option<ConnectionDescriptor>, RepositoryError>;
}

/// Health write-back. This subsystem never reads these records.
#[async_trait]
pub trait GatewayHealthRepository: Send + Sync {
    async fn record(&self, health: &GatewayHealth) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

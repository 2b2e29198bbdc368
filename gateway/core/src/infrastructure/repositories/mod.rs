// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! In-memory implementations of the collaborator contracts defined in
//! `domain::repository`, for development, the CLI and tests.
//!
//! - **InMemoryGatewayDirectory** - HashMap-backed descriptor lookup
//! - **InMemoryGatewayHealthRepository** - Append-only health log

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::gateway::{ConnectionDescriptor, GatewayHealth, GatewayId};
use crate::domain::repository::{GatewayDirectory, GatewayHealthRepository, RepositoryError};

#[derive(Clone, Default)]
pub struct InMemoryGatewayDirectory {
    gateways: Arc<RwLock<HashMap<GatewayId, ConnectionDescriptor>>>,
}

impl InMemoryGatewayDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, gateway_id: GatewayId, descriptor: ConnectionDescriptor) {
        self.gateways.write().insert(gateway_id, descriptor);
    }

    pub fn remove(&self, gateway_id: GatewayId) -> Option<ConnectionDescriptor> {
        self.gateways.write().remove(&gateway_id)
    }
}

#[async_trait]
impl GatewayDirectory for InMemoryGatewayDirectory {
    async fn find_descriptor(
        &self,
        gateway_id: GatewayId,
    ) -> Result<Option<ConnectionDescriptor>, RepositoryError> {
        Ok(self.gateways.read().get(&gateway_id).cloned())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryGatewayHealthRepository {
    records: Arc<RwLock<Vec<GatewayHealth>>>,
}

impl InMemoryGatewayHealthRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record written so far, oldest first
    pub fn records(&self) -> Vec<GatewayHealth> {
        self.records.read().clone()
    }

    pub fn latest(&self, gateway_id: GatewayId) -> Option<GatewayHealth> {
        self.records
            .read()
            .iter()
            .rev()
            .find(|h| h.gateway_id == gateway_id)
            .cloned()
    }
}

#[async_trait]
impl GatewayHealthRepository for InMemoryGatewayHealthRepository {
    async fn record(&self, health: &GatewayHealth) -> Result<(), RepositoryError> {
        self.records.write().push(health.clone());
        Ok(())
    }
}

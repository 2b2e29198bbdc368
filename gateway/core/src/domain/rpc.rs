// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Request/response seam between workflows and a live gateway connection.
//!
//! Method names and params are opaque to this layer; it only correlates.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::GatewayError;

/// Anything that can issue a correlated RPC call against a gateway.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Issue `method` with `params` and wait up to `timeout` for the matching response.
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, GatewayError>;
}

#[async_trait]
impl<T: RpcClient + ?Sized> RpcClient for std::sync::Arc<T> {
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, GatewayError> {
        (**self).call(method, params, timeout).await
    }
}

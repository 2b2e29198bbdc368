// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway RPC client: wire protocol, transport, connection pool and prober.

pub mod connection;
pub mod pool;
pub mod probe;
pub mod protocol;
pub mod tls;
pub mod transport;

pub use connection::{GatewayConnection, PendingCallInfo};
pub use pool::{ConnectionPool, PoolLease};
pub use probe::ping;
pub use transport::{normalize_url, GatewayConnector, ManagedConnection, WebSocketConnector};

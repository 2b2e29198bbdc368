// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway Connection Pool
//!
//! Caches live gateway connections keyed by [`CacheKey`] so short-lived
//! operations can reuse an already-handshaken socket.
//!
//! # Entry lifecycle
//!
//! - created in-use by `acquire` when no usable idle entry exists for the key
//! - `in_use` cleared and `expires_at` pushed to `now + ttl` by `release`
//! - removed when released in a non-open state, when swept idle and expired
//!   at the top of any `acquire`, when evicted for capacity, or by `clear`
//!
//! Eviction is lazy: there is no timer, so an expired idle entry can linger
//! until the next `acquire`. It is never handed out.
//!
//! The pool only ever terminates idle connections. An in-use connection
//! belongs to its holder until `release`.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::domain::client_config::PoolConfig;
use crate::domain::errors::GatewayError;
use crate::domain::gateway::{CacheKey, ConnectionDescriptor, GatewayId};
use crate::infrastructure::gateway::transport::{GatewayConnector, ManagedConnection};

/// A connection handed out by [`ConnectionPool::acquire`].
///
/// Give it back with [`ConnectionPool::release`] using the same cache key.
pub struct PoolLease<T> {
    pub cache_key: CacheKey,
    pub connection: Arc<T>,
}

impl<T> std::fmt::Debug for PoolLease<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolLease")
            .field("cache_key", &self.cache_key)
            .finish_non_exhaustive()
    }
}

struct PoolEntry<T> {
    connection: Arc<T>,
    in_use: bool,
    expires_at: Instant,
}

impl<T: ManagedConnection> PoolEntry<T> {
    fn is_reusable(&self, now: Instant) -> bool {
        !self.in_use && self.expires_at > now && self.connection.state().is_open()
    }
}

pub struct ConnectionPool<C: GatewayConnector> {
    connector: C,
    ttl: Duration,
    max_per_key: usize,
    entries: Mutex<HashMap<CacheKey, Vec<PoolEntry<C::Connection>>>>,
}

impl<C: GatewayConnector> ConnectionPool<C> {
    pub fn new(connector: C, config: &PoolConfig) -> Self {
        Self {
            connector,
            ttl: config.ttl,
            max_per_key: config.max_per_key.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn build_cache_key(gateway_id: &GatewayId, descriptor: &ConnectionDescriptor) -> CacheKey {
        CacheKey::build(gateway_id, descriptor)
    }

    /// Hand out an open connection for this gateway/descriptor, connecting
    /// only when no idle, unexpired, open entry exists for the key.
    pub async fn acquire(
        &self,
        gateway_id: GatewayId,
        descriptor: &ConnectionDescriptor,
    ) -> Result<PoolLease<C::Connection>, GatewayError> {
        let cache_key = Self::build_cache_key(&gateway_id, descriptor);

        {
            let now = Instant::now();
            let mut entries = self.entries.lock();
            self.evict_expired(&mut entries, now);

            if let Some(slot) = entries.get_mut(&cache_key) {
                if let Some(entry) = slot.iter_mut().find(|e| e.is_reusable(now)) {
                    entry.in_use = true;
                    debug!(
                        gateway_id = %gateway_id,
                        cache_key = %cache_key,
                        connection_id = %entry.connection.connection_id(),
                        "Reusing pooled gateway connection"
                    );
                    return Ok(PoolLease {
                        cache_key,
                        connection: entry.connection.clone(),
                    });
                }

                // Idle but no longer open: replace rather than keep around
                slot.retain(|e| {
                    let keep = e.in_use || e.connection.state().is_open();
                    if !keep {
                        e.connection.terminate();
                    }
                    keep
                });
                let empty = slot.is_empty();
                if empty {
                    entries.remove(&cache_key);
                }
            }
        }

        let connection = self.connector.connect(descriptor).await?;

        let now = Instant::now();
        let mut entries = self.entries.lock();
        let slot = entries.entry(cache_key.clone()).or_default();

        // The new entry returns to the idle set on release, so make room for it there
        while slot.iter().filter(|e| !e.in_use).count() >= self.max_per_key {
            let oldest_idle = slot
                .iter()
                .enumerate()
                .filter(|(_, e)| !e.in_use)
                .min_by_key(|(_, e)| e.expires_at)
                .map(|(index, _)| index);
            let Some(index) = oldest_idle else {
                break;
            };
            let evicted = slot.remove(index);
            evicted.connection.terminate();
            info!(
                cache_key = %cache_key,
                connection_id = %evicted.connection.connection_id(),
                max_per_key = self.max_per_key,
                "Evicted oldest idle gateway connection over capacity"
            );
        }

        slot.push(PoolEntry {
            connection: connection.clone(),
            in_use: true,
            expires_at: now + self.ttl,
        });
        debug!(
            gateway_id = %gateway_id,
            cache_key = %cache_key,
            connection_id = %connection.connection_id(),
            entries_for_key = slot.len(),
            "Pooled new gateway connection"
        );

        Ok(PoolLease {
            cache_key,
            connection,
        })
    }

    /// Return a connection to the idle set, or drop it if it is no longer open.
    ///
    /// Unknown `(connection, cache_key)` pairs are ignored.
    pub fn release(&self, connection: &Arc<C::Connection>, cache_key: &CacheKey) {
        let mut entries = self.entries.lock();
        let Some(slot) = entries.get_mut(cache_key) else {
            debug!(cache_key = %cache_key, "Release for unknown cache key ignored");
            return;
        };
        let Some(index) = slot
            .iter()
            .position(|e| Arc::ptr_eq(&e.connection, connection))
        else {
            debug!(
                cache_key = %cache_key,
                connection_id = %connection.connection_id(),
                "Release for unknown connection ignored"
            );
            return;
        };

        if !connection.state().is_open() {
            let dead = slot.remove(index);
            dead.connection.terminate();
            let empty = slot.is_empty();
            if empty {
                entries.remove(cache_key);
            }
            debug!(
                cache_key = %cache_key,
                connection_id = %connection.connection_id(),
                "Discarded non-open gateway connection on release"
            );
            return;
        }

        let entry = &mut slot[index];
        entry.in_use = false;
        entry.expires_at = Instant::now() + self.ttl;
    }

    /// Terminate every pooled connection, in use or not, and forget them all.
    pub fn clear(&self) {
        let drained: Vec<_> = self.entries.lock().drain().collect();
        let mut closed = 0usize;
        for (_, slot) in drained {
            for entry in slot {
                entry.connection.terminate();
                closed += 1;
            }
        }
        if closed > 0 {
            info!(closed, "Cleared gateway connection pool");
        }
    }

    /// Entries currently tracked, idle and in-use
    pub fn size(&self) -> usize {
        self.entries.lock().values().map(Vec::len).sum()
    }

    pub fn idle_count(&self, cache_key: &CacheKey) -> usize {
        self.entries
            .lock()
            .get(cache_key)
            .map(|slot| slot.iter().filter(|e| !e.in_use).count())
            .unwrap_or(0)
    }

    fn evict_expired(&self, entries: &mut HashMap<CacheKey, Vec<PoolEntry<C::Connection>>>, now: Instant) {
        entries.retain(|cache_key, slot| {
            slot.retain(|entry| {
                let expired = !entry.in_use && entry.expires_at <= now;
                if expired {
                    entry.connection.terminate();
                    debug!(
                        cache_key = %cache_key,
                        connection_id = %entry.connection.connection_id(),
                        "Evicted expired gateway connection"
                    );
                }
                !expired
            });
            !slot.is_empty()
        });
    }
}

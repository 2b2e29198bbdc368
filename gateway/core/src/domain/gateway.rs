// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway value types: identity, connection descriptor, pool cache key,
//! connection state and health reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GatewayId(pub Uuid);

impl GatewayId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for GatewayId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GatewayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How to reach a gateway. Does not identify a live connection.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDescriptor {
    /// Endpoint address (`ws://`, `wss://` or bare `host:port`)
    pub url: String,

    /// Token presented in the `connect` handshake
    #[serde(default)]
    pub auth_token: String,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub allow_insecure_tls: bool,

    /// Omit the device block from the handshake
    #[serde(default)]
    pub disable_device_pairing: bool,
}

impl ConnectionDescriptor {
    pub fn new(url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: auth_token.into(),
            allow_insecure_tls: false,
            disable_device_pairing: false,
        }
    }

    pub fn with_insecure_tls(mut self, allow: bool) -> Self {
        self.allow_insecure_tls = allow;
        self
    }

    pub fn with_device_pairing_disabled(mut self, disabled: bool) -> Self {
        self.disable_device_pairing = disabled;
        self
    }
}

// The token is a credential; keep it out of debug logs.
impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("url", &self.url)
            .field("auth_token", &if self.auth_token.is_empty() { "" } else { "<redacted>" })
            .field("allow_insecure_tls", &self.allow_insecure_tls)
            .field("disable_device_pairing", &self.disable_device_pairing)
            .finish()
    }
}

/// Pool partition key: one per (gateway, descriptor) pair.
///
/// Rendered as `<gateway id>:<sha256 of every descriptor field>`. The digest
/// input is a JSON array, so field boundaries can't be forged by values that
/// contain separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn build(gateway_id: &GatewayId, descriptor: &ConnectionDescriptor) -> Self {
        let material = serde_json::json!([
            gateway_id.0.to_string(),
            descriptor.url,
            descriptor.auth_token,
            descriptor.allow_insecure_tls,
            descriptor.disable_device_pairing,
        ]);
        let digest = Sha256::digest(material.to_string().as_bytes());
        Self(format!("{}:{}", gateway_id, hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a transport connection. Only `Open` connections accept calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ConnectionState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }

    pub fn is_open(self) -> bool {
        self == ConnectionState::Open
    }
}

/// Outcome of a reachability probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PingResult {
    pub fn ok(latency_ms: u64) -> Self {
        Self {
            success: true,
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            latency_ms: None,
            error: Some(error.into()),
        }
    }
}

/// Health record written back to the gateway directory after a status check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayHealth {
    pub gateway_id: GatewayId,
    pub is_healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl GatewayHealth {
    pub fn from_ping(gateway_id: GatewayId, ping: PingResult) -> Self {
        Self {
            gateway_id,
            is_healthy: ping.success,
            latency_ms: ping.latency_ms,
            error: ping.error,
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor::new("wss://gw.example.com", "secret")
    }

    #[test]
    fn test_cache_key_is_stable() {
        let gateway_id = GatewayId::new();
        let first = CacheKey::build(&gateway_id, &descriptor());
        let second = CacheKey::build(&gateway_id, &descriptor());
        assert_eq!(first, second);
        assert!(first.as_str().starts_with(&gateway_id.to_string()));
    }

    #[test]
    fn test_cache_key_differs_per_field() {
        let gateway_id = GatewayId::new();
        let base = CacheKey::build(&gateway_id, &descriptor());

        let variants = vec![
            ConnectionDescriptor::new("wss://other.example.com", "secret"),
            ConnectionDescriptor::new("wss://gw.example.com", "other"),
            descriptor().with_insecure_tls(true),
            descriptor().with_device_pairing_disabled(true),
        ];
        for variant in variants {
            assert_ne!(base, CacheKey::build(&gateway_id, &variant), "{:?}", variant);
        }

        assert_ne!(base, CacheKey::build(&GatewayId::new(), &descriptor()));
    }

    #[test]
    fn test_cache_key_boolean_flags_do_not_collapse() {
        let gateway_id = GatewayId::new();
        let insecure = descriptor().with_insecure_tls(true);
        let unpaired = descriptor().with_device_pairing_disabled(true);
        assert_ne!(
            CacheKey::build(&gateway_id, &insecure),
            CacheKey::build(&gateway_id, &unpaired)
        );
    }

    #[test]
    fn test_cache_key_does_not_leak_token() {
        let key = CacheKey::build(&GatewayId::new(), &descriptor());
        assert!(!key.as_str().contains("secret"));
        assert!(!format!("{:?}", descriptor()).contains("secret"));
    }

    #[test]
    fn test_connection_state_roundtrip() {
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Closing,
            ConnectionState::Closed,
        ] {
            assert_eq!(ConnectionState::from_u8(state as u8), state);
        }
        assert!(ConnectionState::Open.is_open());
        assert!(!ConnectionState::Closing.is_open());
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway wire protocol.
//!
//! JSON text frames over WebSocket, discriminated by `type`:
//! - `req`: client → gateway RPC call
//! - `res`: gateway → client RPC result, correlated by `id`
//! - `event`: gateway → client unsolicited push

use serde::{Deserialize, Serialize};

use crate::domain::client_config::ClientIdentity;
use crate::domain::gateway::ConnectionDescriptor;

pub const PROTOCOL_VERSION: u32 = 3;
pub const CONNECT_METHOD: &str = "connect";
pub const CHALLENGE_EVENT: &str = "connect.challenge";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Discriminated union of all frame types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GatewayFrame {
    #[serde(rename = "req")]
    Request(RequestFrame),
    #[serde(rename = "res")]
    Response(ResponseFrame),
    #[serde(rename = "event")]
    Event(EventFrame),
}

impl GatewayFrame {
    pub fn request(
        id: impl Into<String>,
        method: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        GatewayFrame::Request(RequestFrame {
            id: id.into(),
            method: method.into(),
            params: if params.is_null() { None } else { Some(params) },
        })
    }

    /// Parse one text frame; `None` for anything that is not a known frame.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

impl ResponseFrame {
    pub fn ok(id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(ErrorShape {
                code: code.into(),
                message: message.into(),
                details: None,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl EventFrame {
    pub fn challenge_nonce(&self) -> Option<&str> {
        if self.event != CHALLENGE_EVENT {
            return None;
        }
        self.payload.as_ref()?.get("nonce")?.as_str()
    }
}

/// Parameters of the `connect` handshake request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub min_protocol: u32,
    pub max_protocol: u32,
    pub client: ClientInfo,
    pub role: String,
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<ConnectAuth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: String,
    pub version: String,
    pub platform: String,
    pub mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectAuth {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub nonce: String,
}

impl ConnectParams {
    pub fn new(identity: &ClientIdentity, descriptor: &ConnectionDescriptor, nonce: &str) -> Self {
        Self {
            min_protocol: PROTOCOL_VERSION,
            max_protocol: PROTOCOL_VERSION,
            client: ClientInfo {
                id: identity.id.clone(),
                version: identity.version.clone(),
                platform: identity.platform.clone(),
                mode: identity.mode.clone(),
            },
            role: identity.role.clone(),
            scopes: identity.scopes.clone(),
            auth: (!descriptor.auth_token.is_empty()).then(|| ConnectAuth {
                token: descriptor.auth_token.clone(),
            }),
            device: (!descriptor.disable_device_pairing).then(|| DeviceInfo {
                id: identity.device_id.clone(),
                nonce: nonce.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_frame() {
        let json = r#"{"type":"res","id":"1","ok":true,"payload":{"result":"ok"}}"#;
        match GatewayFrame::parse(json) {
            Some(GatewayFrame::Response(res)) => {
                assert_eq!(res.id, "1");
                assert!(res.ok);
                assert_eq!(res.payload.unwrap()["result"], "ok");
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_response() {
        let json = r#"{"type":"res","id":"7","ok":false,"error":{"code":"NOT_FOUND","message":"no session"}}"#;
        let Some(GatewayFrame::Response(res)) = GatewayFrame::parse(json) else {
            panic!("expected response");
        };
        let error = res.error.unwrap();
        assert_eq!(error.code, "NOT_FOUND");
        assert_eq!(error.message, "no session");
    }

    #[test]
    fn test_unknown_frames_are_rejected() {
        assert!(GatewayFrame::parse("not json").is_none());
        assert!(GatewayFrame::parse(r#"{"type":"tick"}"#).is_none());
        assert!(GatewayFrame::parse(r#"{"id":"1","ok":true}"#).is_none());
    }

    #[test]
    fn test_request_serialization_omits_null_params() {
        let text = GatewayFrame::request("abc", "health", serde_json::Value::Null)
            .to_text()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "req");
        assert_eq!(value["method"], "health");
        assert!(value.get("params").is_none());
    }

    #[test]
    fn test_challenge_nonce() {
        let frame = EventFrame {
            event: CHALLENGE_EVENT.to_string(),
            payload: Some(serde_json::json!({"nonce": "n-1", "ts": 1})),
            seq: None,
        };
        assert_eq!(frame.challenge_nonce(), Some("n-1"));

        let other = EventFrame {
            event: "presence".to_string(),
            payload: Some(serde_json::json!({"nonce": "n-1"})),
            seq: Some(3),
        };
        assert_eq!(other.challenge_nonce(), None);
    }

    #[test]
    fn test_connect_params_honor_descriptor_flags() {
        let identity = ClientIdentity::default();
        let paired = ConnectParams::new(&identity, &ConnectionDescriptor::new("ws://gw", "tok"), "n");
        let value = serde_json::to_value(&paired).unwrap();
        assert_eq!(value["auth"]["token"], "tok");
        assert_eq!(value["device"]["nonce"], "n");
        assert_eq!(value["minProtocol"], PROTOCOL_VERSION);

        let unpaired = ConnectParams::new(
            &identity,
            &ConnectionDescriptor::new("ws://gw", "").with_device_pairing_disabled(true),
            "n",
        );
        let value = serde_json::to_value(&unpaired).unwrap();
        assert!(value.get("auth").is_none());
        assert!(value.get("device").is_none());
    }
}

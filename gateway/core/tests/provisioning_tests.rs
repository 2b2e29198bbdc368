// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Provisioning workflow: step order, data flow between steps, and
//! first-failure abort.

mod common;

use common::{FakeConnector, Responder};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use switchboard_core::application::provisioning::{AgentProvisioner, PROVISIONING_STEPS};
use switchboard_core::domain::errors::GatewayError;
use switchboard_core::domain::gateway::{ConnectionDescriptor, GatewayId};
use switchboard_core::domain::provisioning::{AgentId, AgentRef, ProvisioningContext, WorkspaceId};
use switchboard_core::infrastructure::gateway::GatewayConnector;

fn context() -> ProvisioningContext {
    ProvisioningContext {
        agent: AgentRef::new(AgentId::new(), "scout"),
        workspace_id: WorkspaceId::new(),
        gateway_id: GatewayId::new(),
        peers: vec![
            AgentRef::new(AgentId::new(), "planner"),
            AgentRef::new(AgentId::new(), "reviewer"),
        ],
        base_url: "https://control.example.com/".to_string(),
        auth_token: "callback-secret".to_string(),
    }
}

fn gateway_responder(fail_method: Option<&'static str>) -> Responder {
    Arc::new(move |method: &str, params: &Value| {
        if Some(method) == fail_method {
            return Err(GatewayError::Rpc {
                method: method.to_string(),
                code: "UNAVAILABLE".to_string(),
                message: "peer store offline".to_string(),
                details: None,
            });
        }
        Ok(match method {
            "agents.pair" => json!({ "pairingToken": "pair-123" }),
            "agents.identity.set" => json!({ "agentId": "gw-agent-7" }),
            "sessions.create" => json!({ "key": params["key"] }),
            "sessions.get" => json!({ "key": params["key"], "status": "ready" }),
            _ => json!({}),
        })
    })
}

fn descriptor() -> ConnectionDescriptor {
    ConnectionDescriptor::new("ws://gw.internal:18789", "t")
}

#[tokio::test]
async fn test_runs_all_seven_steps_in_order() {
    let connector = FakeConnector::with_responder(gateway_responder(None));
    let connection = connector.connect(&descriptor()).await.unwrap();
    let ctx = context();

    let key = AgentProvisioner::new(Duration::from_secs(5))
        .provision(connection.as_ref(), &ctx)
        .await
        .unwrap();

    assert_eq!(key, ctx.session_key());
    assert_eq!(connection.methods(), PROVISIONING_STEPS.to_vec());
}

#[tokio::test]
async fn test_step_outputs_feed_later_steps() {
    let connector = FakeConnector::with_responder(gateway_responder(None));
    let connection = connector.connect(&descriptor()).await.unwrap();
    let ctx = context();

    AgentProvisioner::new(Duration::from_secs(5))
        .provision(connection.as_ref(), &ctx)
        .await
        .unwrap();

    let calls: Vec<(String, Value)> = connection.calls.lock().clone();
    assert_eq!(calls[1].1["pairingToken"], "pair-123");
    for (method, params) in &calls[2..5] {
        assert_eq!(params["agentId"], "gw-agent-7", "{}", method);
    }
    assert_eq!(calls[2].1["peers"].as_array().unwrap().len(), 2);
    assert_eq!(calls[3].1["key"], ctx.session_key());
    assert_eq!(
        calls[4].1["url"],
        format!("https://control.example.com/api/v1/agents/{}/callback", ctx.agent.id)
    );
    assert_eq!(calls[4].1["token"], "callback-secret");
    assert_eq!(calls[5].1["metadata"]["workspaceId"], ctx.workspace_id.to_string());
}

#[tokio::test]
async fn test_third_step_failure_aborts_remaining_steps() {
    let connector = FakeConnector::with_responder(gateway_responder(Some("agents.peers.sync")));
    let connection = connector.connect(&descriptor()).await.unwrap();

    let err = AgentProvisioner::new(Duration::from_secs(5))
        .provision(connection.as_ref(), &context())
        .await
        .unwrap_err();

    assert_eq!(err.step, 3);
    assert_eq!(err.method, "agents.peers.sync");
    match err.into_source() {
        GatewayError::Rpc { code, message, .. } => {
            assert_eq!(code, "UNAVAILABLE");
            assert_eq!(message, "peer store offline");
        }
        other => panic!("expected the step's own error, got {:?}", other),
    }
    assert_eq!(
        connection.methods(),
        vec!["agents.pair", "agents.identity.set", "agents.peers.sync"]
    );
}

#[tokio::test]
async fn test_missing_pairing_token_fails_step_one() {
    let responder: Responder = Arc::new(|_: &str, _: &Value| Ok(json!({})));
    let connector = FakeConnector::with_responder(responder);
    let connection = connector.connect(&descriptor()).await.unwrap();

    let err = AgentProvisioner::new(Duration::from_secs(5))
        .provision(connection.as_ref(), &context())
        .await
        .unwrap_err();

    assert_eq!(err.step, 1);
    assert!(matches!(err.source, GatewayError::Protocol(_)));
    assert_eq!(connection.methods(), vec!["agents.pair"]);
}

#[tokio::test]
async fn test_unconfirmed_session_fails_last_step() {
    let responder: Responder = Arc::new(|method: &str, params: &Value| {
        Ok(match method {
            "agents.pair" => json!({ "pairingToken": "p" }),
            "agents.identity.set" => json!({ "agentId": "a" }),
            "sessions.create" => json!({ "key": params["key"] }),
            "sessions.get" => json!({ "key": "someone-else" }),
            _ => json!({}),
        })
    });
    let connector = FakeConnector::with_responder(responder);
    let connection = connector.connect(&descriptor()).await.unwrap();

    let err = AgentProvisioner::new(Duration::from_secs(5))
        .provision(connection.as_ref(), &context())
        .await
        .unwrap_err();
    assert_eq!(err.step, 7);
    assert_eq!(err.method, "sessions.get");
}

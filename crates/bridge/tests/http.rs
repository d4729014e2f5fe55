// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios over the in-process coordinator router, driven
//! with `axum_test`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum_test::TestServer;
use edgebridge::adapter::AdapterRegistry;
use edgebridge::config::BridgeConfig;
use edgebridge::coordinator::BridgeCoordinator;
use edgebridge::model::AdapterConfig;

fn base_config(db_path: &std::path::Path) -> BridgeConfig {
    let yaml = format!(
        "serverUrl: https://cloud.example.com\ndatabasePath: {}\ntier: full\n",
        db_path.display()
    );
    serde_yaml::from_str(&yaml).expect("valid config fixture")
}

async fn coordinator_with_adapters(db_path: &std::path::Path, adapters: &[(&str, &str)]) -> Arc<BridgeCoordinator> {
    let mut config = base_config(db_path);
    config.enabled_adapters = adapters.iter().map(|(kind, _)| kind.to_string()).collect();
    for (kind, name) in adapters {
        config.adapter_configs.insert(
            kind.to_string(),
            AdapterConfig { name: name.to_string(), enabled: true, settings: serde_json::Value::Null },
        );
    }
    BridgeCoordinator::start(&config, None).await.expect("coordinator starts")
}

#[tokio::test]
async fn health_endpoint_reports_ok_with_simulator_registered() {
    let dir = tempfile::tempdir().expect("tempdir");
    let coordinator = coordinator_with_adapters(&dir.path().join("q.sqlite3"), &[("simulator", "sim-1")]).await;
    let server = TestServer::new(coordinator.router()).expect("test server");

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["status"] == "healthy" || body["status"] == "degraded");

    coordinator.shutdown().await;
}

#[tokio::test]
async fn open_door_rejects_duration_over_cap() {
    let dir = tempfile::tempdir().expect("tempdir");
    let coordinator = coordinator_with_adapters(&dir.path().join("q.sqlite3"), &[("simulator", "A2")]).await;
    let server = TestServer::new(coordinator.router()).expect("test server");

    let response = server.post("/open-door").json(&serde_json::json!({ "durationMs": 40_000 })).await;
    response.assert_status_bad_request();

    coordinator.shutdown().await;
}

#[tokio::test]
async fn open_door_dispatches_to_first_healthy_adapter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let coordinator = coordinator_with_adapters(&dir.path().join("q.sqlite3"), &[("simulator", "A2")]).await;
    let server = TestServer::new(coordinator.router()).expect("test server");

    let response = server.post("/open-door").json(&serde_json::json!({ "durationMs": 2_000 })).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["adapter"], "A2");
    assert_eq!(body["duration"], 2_000);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn open_door_get_is_method_not_allowed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let coordinator = coordinator_with_adapters(&dir.path().join("q.sqlite3"), &[("simulator", "A2")]).await;
    let server = TestServer::new(coordinator.router()).expect("test server");

    let response = server.get("/open-door").await;
    response.assert_status(axum::http::StatusCode::METHOD_NOT_ALLOWED);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn queue_admin_endpoint_lists_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let coordinator = coordinator_with_adapters(&dir.path().join("q.sqlite3"), &[]).await;

    let event = edgebridge::model::StandardEvent {
        event_id: "evt_test_1".into(),
        external_user_id: "u1".into(),
        internal_user_id: None,
        timestamp: edgebridge::model::chrono_compat::Timestamp::now(),
        kind: edgebridge::model::EventKind::Entry,
        attributes: std::collections::HashMap::new(),
        simulated: true,
        device_id: "unpaired".into(),
    };
    coordinator.queue.enqueue(&event).expect("enqueue succeeds");

    let server = TestServer::new(coordinator.router()).expect("test server");
    let response = server.get("/queue").await;
    response.assert_status_ok();
    let rows: Vec<serde_json::Value> = response.json();
    assert_eq!(rows.len(), 1);

    coordinator.shutdown().await;
}

#[test]
fn registry_with_builtins_covers_every_concrete_adapter() {
    let registry = AdapterRegistry::with_builtins();
    for kind in ["simulator", "webhook", "rfid", "fingerprint"] {
        assert!(registry.construct(kind, "instance").is_some(), "missing builtin kind {kind}");
    }
}

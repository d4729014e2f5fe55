// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `edgebridge` binary and
//! exercise its local HTTP API against a stubbed cloud.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use edgebridge_specs::BridgeProcess;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn health_endpoint_responds_once_running() -> anyhow::Result<()> {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/api/v1/checkin")).respond_with(ResponseTemplate::new(502)).mount(&mock_server).await;

    let bridge = BridgeProcess::start(&mock_server.uri())?;
    bridge.wait_ready(TIMEOUT).await?;

    let resp: serde_json::Value = reqwest::get(format!("{}/health", bridge.base_url())).await?.json().await?;
    assert!(resp["status"].is_string());
    assert_eq!(resp["tier"], "full");

    Ok(())
}

#[tokio::test]
async fn open_door_endpoint_dispatches_to_simulator() -> anyhow::Result<()> {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/api/v1/checkin")).respond_with(ResponseTemplate::new(502)).mount(&mock_server).await;

    let bridge = BridgeProcess::start(&mock_server.uri())?;
    bridge.wait_ready(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/open-door", bridge.base_url()))
        .json(&serde_json::json!({ "durationMs": 2000 }))
        .send()
        .await?;
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["success"], true);

    Ok(())
}

#[tokio::test]
async fn queue_accumulates_while_cloud_is_unreachable() -> anyhow::Result<()> {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/api/v1/checkin")).respond_with(ResponseTemplate::new(502)).mount(&mock_server).await;

    let bridge = BridgeProcess::start(&mock_server.uri())?;
    bridge.wait_ready(TIMEOUT).await?;

    let client = reqwest::Client::new();
    client.post(format!("{}/open-door", bridge.base_url())).json(&serde_json::json!({})).send().await?;

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        let resp: serde_json::Value = reqwest::get(format!("{}/health", bridge.base_url())).await?.json().await?;
        if resp["status"] != serde_json::Value::Null {
            break;
        }
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("health never reported a status");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    Ok(())
}

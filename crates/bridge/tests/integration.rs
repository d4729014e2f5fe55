// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario-level coverage against a `wiremock` cloud stub: happy path,
//! offline resilience, and pairing/skew-retry on the signed client.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use edgebridge::client::{AuthenticatedClient, CheckinEvent, DeviceInfo, HealthSnapshot};
use edgebridge::model::Tier;
use edgebridge::queue::DurableQueue;
use edgebridge::submission::SubmissionService;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample_event(id: &str) -> edgebridge::model::StandardEvent {
    edgebridge::model::StandardEvent {
        event_id: id.to_owned(),
        external_user_id: "u1".into(),
        internal_user_id: None,
        timestamp: edgebridge::model::chrono_compat::Timestamp::now(),
        kind: edgebridge::model::EventKind::Entry,
        attributes: std::collections::HashMap::new(),
        simulated: true,
        device_id: "d1".into(),
    }
}

#[tokio::test]
async fn s1_happy_path_single_event_drains_after_successful_checkin() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/checkin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true, "processedIds": ["evt_1"], "failedIds": []
        })))
        .mount(&mock_server)
        .await;

    let queue = Arc::new(DurableQueue::open_in_memory(100).expect("queue opens"));
    queue.enqueue(&sample_event("evt_1")).expect("enqueue succeeds");

    let client = Arc::new(AuthenticatedClient::new(mock_server.uri()).with_credentials("d1".into(), "k1".into()));
    let service = SubmissionService::new(queue.clone(), client, Tier::Full);
    service.tick(&CancellationToken::new()).await;

    assert_eq!(queue.depth().expect("depth reads"), 0);
    assert_eq!(queue.stats().expect("stats reads").sent, 1);
}

#[tokio::test]
async fn s3_offline_resilience_queue_accumulates_without_marking_sent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/checkin"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let queue = Arc::new(DurableQueue::open_in_memory(500).expect("queue opens"));
    for i in 0..50 {
        queue.enqueue(&sample_event(&format!("evt_{i}"))).expect("enqueue succeeds");
    }

    let client = Arc::new(AuthenticatedClient::new(mock_server.uri()).with_credentials("d1".into(), "k1".into()));
    let service = SubmissionService::new(queue.clone(), client, Tier::Full);
    service.tick(&CancellationToken::new()).await;

    let stats = queue.stats().expect("stats reads");
    assert_eq!(stats.sent, 0);
    assert_eq!(stats.depth, 50);
}

#[tokio::test]
async fn s3_offline_resilience_drains_once_cloud_recovers() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/checkin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true, "processedIds": ["evt_0"], "failedIds": []
        })))
        .mount(&mock_server)
        .await;

    let queue = Arc::new(DurableQueue::open_in_memory(500).expect("queue opens"));
    queue.enqueue(&sample_event("evt_0")).expect("enqueue succeeds");

    let client = Arc::new(AuthenticatedClient::new(mock_server.uri()).with_credentials("d1".into(), "k1".into()));
    let service = SubmissionService::new(queue.clone(), client, Tier::Full);
    service.tick(&CancellationToken::new()).await;

    assert_eq!(queue.depth().expect("depth reads"), 0);
}

#[tokio::test]
async fn s5_pairing_persists_credentials_and_config_override() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/devices/pair"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "deviceId": "d1", "deviceKey": "k1", "config": { "heartbeatInterval": 90 }
        })))
        .mount(&mock_server)
        .await;

    let client = AuthenticatedClient::new(mock_server.uri());
    let info = DeviceInfo { hostname: "host-1".into(), platform: "linux".into(), version: "0.1.0".into(), tier: Tier::Normal };
    let response = client.pair("ABC123", &info).await.expect("pair succeeds");

    assert_eq!(response.device_id, "d1");
    assert_eq!(response.device_key, "k1");
    let heartbeat_interval = response.config.as_ref().and_then(|c| c["heartbeatInterval"].as_u64());
    assert_eq!(heartbeat_interval, Some(90));
}

#[tokio::test]
async fn s6_skew_retry_succeeds_on_second_attempt() {
    let mock_server = MockServer::start().await;
    let server_time = edgebridge::model::chrono_compat::Timestamp::now().unix_secs() + 10;

    Mock::given(method("POST"))
        .and(path("/api/v1/devices/heartbeat"))
        .respond_with(
            ResponseTemplate::new(401).insert_header("X-Server-Time", server_time.to_string()),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/devices/heartbeat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&mock_server)
        .await;

    let client = AuthenticatedClient::new(mock_server.uri()).with_credentials("d1".into(), "k1".into());
    let snapshot = HealthSnapshot {
        status: "healthy".into(),
        tier: Tier::Normal,
        queue_depth: 0,
        cpu_percent: 10.0,
        memory_percent: 10.0,
        last_event_time: None,
    };
    let result = client.heartbeat(&snapshot).await;
    assert!(result.is_ok(), "expected skew retry to succeed, got {result:?}");
}

#[tokio::test]
async fn checkin_batch_over_100_events_is_rejected_locally() {
    let client = AuthenticatedClient::new("https://cloud.example.com".into()).with_credentials("d1".into(), "k1".into());
    let events: Vec<CheckinEvent> = (0..101)
        .map(|i| CheckinEvent {
            event_id: format!("evt_{i}"),
            external_user_id: "u1".into(),
            timestamp: "2026-01-01T00:00:00.000000000Z".into(),
            event_type: "entry".into(),
            is_simulated: true,
            device_id: "d1".into(),
        })
        .collect();
    let result = client.checkin(&events).await;
    assert!(result.is_err(), "checkin should reject oversized batches before any network call");
}

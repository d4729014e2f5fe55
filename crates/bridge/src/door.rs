// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local HTTP unlock endpoint. Binds to loopback by default; dispatches to
//! the adapter manager's first-fit unlock policy or an explicitly named
//! adapter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::{Query, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::manager::AdapterManager;
use crate::model::chrono_compat::Timestamp;

const MAX_UNLOCK_MS: u64 = 30_000;

pub struct DoorController {
    manager: Arc<AdapterManager>,
    default_duration_ms: u64,
    unlock_count: AtomicU64,
    last_unlock: std::sync::Mutex<Option<Timestamp>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct OpenDoorQuery {
    pub duration: Option<u64>,
    pub adapter: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct OpenDoorBody {
    #[serde(rename = "durationMs")]
    pub duration_ms: Option<u64>,
    pub adapter: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OpenDoorResponse {
    pub success: bool,
    pub duration: u64,
    pub adapter: String,
    pub timestamp: String,
}

impl DoorController {
    pub fn new(manager: Arc<AdapterManager>, default_duration_ms: u64) -> Self {
        Self { manager, default_duration_ms, unlock_count: AtomicU64::new(0), last_unlock: std::sync::Mutex::new(None) }
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new().route("/open-door", post(open_door)).with_state(self)
    }

    pub fn stats(&self) -> (u64, Option<Timestamp>) {
        (self.unlock_count.load(Ordering::Relaxed), self.last_unlock.lock().ok().and_then(|l| *l))
    }

    async fn dispatch(&self, duration_ms: u64, adapter: Option<&str>) -> Result<OpenDoorResponse, BridgeError> {
        if duration_ms > MAX_UNLOCK_MS {
            return Err(BridgeError::BadRequest("DURATION_TOO_LONG".into()));
        }
        let chosen = self
            .manager
            .unlock_door(adapter, duration_ms)
            .await
            .map_err(|_| BridgeError::Adapter("UNLOCK_FAILED".into()))?;

        self.unlock_count.fetch_add(1, Ordering::Relaxed);
        let now = Timestamp::now();
        if let Ok(mut last) = self.last_unlock.lock() {
            *last = Some(now);
        }
        Ok(OpenDoorResponse { success: true, duration: duration_ms, adapter: chosen, timestamp: now.to_rfc3339_nanos() })
    }
}

async fn open_door(
    State(controller): State<Arc<DoorController>>,
    Query(query): Query<OpenDoorQuery>,
    body: axum::body::Bytes,
) -> Result<Json<OpenDoorResponse>, BridgeError> {
    let parsed_body: OpenDoorBody = if body.is_empty() {
        OpenDoorBody::default()
    } else {
        serde_json::from_slice(&body).unwrap_or_default()
    };

    let duration_ms = parsed_body.duration_ms.or(query.duration).unwrap_or(controller.default_duration_ms);
    let adapter = parsed_body.adapter.or(query.adapter);

    controller.dispatch(duration_ms, adapter.as_deref()).await.map(Json)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::adapter::AdapterRegistry;
    use crate::model::AdapterConfig;
    use tokio_util::sync::CancellationToken;

    async fn manager_with_one_healthy() -> Arc<AdapterManager> {
        let manager = Arc::new(AdapterManager::new(
            AdapterRegistry::with_builtins(),
            Arc::new(|_event| {}),
            CancellationToken::new(),
        ));
        manager
            .load_all(&[("simulator".into(), AdapterConfig { name: "A2".into(), enabled: true, settings: serde_json::Value::Null })])
            .await;
        manager
    }

    #[tokio::test]
    async fn dispatch_rejects_duration_over_cap() {
        let manager = manager_with_one_healthy().await;
        let controller = DoorController::new(manager, 3_000);
        let err = controller.dispatch(40_000, None).await.unwrap_err();
        assert!(matches!(err, BridgeError::BadRequest(m) if m == "DURATION_TOO_LONG"));
    }

    #[tokio::test]
    async fn dispatch_succeeds_with_first_fit_adapter() {
        let manager = manager_with_one_healthy().await;
        let controller = DoorController::new(manager, 3_000);
        let response = controller.dispatch(2_000, None).await.unwrap();
        assert_eq!(response.adapter, "A2");
        assert_eq!(response.duration, 2_000);
        assert_eq!(controller.stats().0, 1);
    }

    #[tokio::test]
    async fn dispatch_fails_when_no_adapters_registered() {
        let manager = Arc::new(AdapterManager::new(AdapterRegistry::with_builtins(), Arc::new(|_event| {}), CancellationToken::new()));
        let controller = DoorController::new(manager, 3_000);
        let err = controller.dispatch(2_000, None).await.unwrap_err();
        assert!(matches!(err, BridgeError::Adapter(m) if m == "UNLOCK_FAILED"));
    }
}

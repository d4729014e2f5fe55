// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook adapter: opens an HTTP listener on a configured port/path and
//! translates POST bodies into `RawHardwareEvent`s, using the same
//! axum-router construction the local HTTP surfaces use elsewhere in this
//! crate.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::HardwareAdapter;
use crate::error::BridgeError;
use crate::model::{AdapterState, AdapterStatus, EventKind, RawHardwareEvent};

#[derive(Debug, Clone, Deserialize)]
struct WebhookSettings {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_path")]
    path: String,
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}
fn default_port() -> u16 {
    9090
}
fn default_path() -> String {
    "/webhook".to_owned()
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), path: default_path() }
    }
}

/// Body shape accepted at the webhook path; translated 1:1 into a
/// `RawHardwareEvent`.
#[derive(Debug, Deserialize)]
struct WebhookBody {
    external_user_id: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    attributes: std::collections::HashMap<String, serde_json::Value>,
}

struct WebhookState {
    tx: Mutex<Option<mpsc::Sender<RawHardwareEvent>>>,
}

pub struct WebhookAdapter {
    name: String,
    settings: Mutex<WebhookSettings>,
    status: Mutex<AdapterStatus>,
    server_handle: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<WebhookState>,
}

impl WebhookAdapter {
    pub fn new(name: String) -> Self {
        Self {
            status: Mutex::new(AdapterStatus::new(name.clone(), AdapterState::Disabled)),
            name,
            settings: Mutex::new(WebhookSettings::default()),
            server_handle: Mutex::new(None),
            shared: Arc::new(WebhookState { tx: Mutex::new(None) }),
        }
    }
}

async fn handle_event(State(state): State<Arc<WebhookState>>, Json(body): Json<WebhookBody>) -> axum::http::StatusCode {
    let kind = match body.kind.as_deref() {
        Some("exit") => EventKind::Exit,
        Some("denied") => EventKind::Denied,
        _ => EventKind::Entry,
    };
    let event = RawHardwareEvent {
        external_user_id: body.external_user_id,
        timestamp: crate::model::chrono_compat::Timestamp::now(),
        kind,
        attributes: body.attributes,
    };
    let tx = state.tx.lock().ok().and_then(|g| g.clone());
    if let Some(tx) = tx {
        if tx.send(event).await.is_ok() {
            return axum::http::StatusCode::ACCEPTED;
        }
    }
    axum::http::StatusCode::SERVICE_UNAVAILABLE
}

#[async_trait]
impl HardwareAdapter for WebhookAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self, settings: serde_json::Value) -> Result<(), BridgeError> {
        let parsed: WebhookSettings = if settings.is_null() {
            WebhookSettings::default()
        } else {
            serde_json::from_value(settings).map_err(|e| BridgeError::Validation(format!("webhook settings: {e}")))?
        };
        if let Ok(mut s) = self.settings.lock() {
            *s = parsed;
        }
        if let Ok(mut status) = self.status.lock() {
            status.state = AdapterState::Active;
            status.updated_at = crate::model::chrono_compat::Timestamp::now();
        }
        Ok(())
    }

    async fn start_listening(&self, tx: mpsc::Sender<RawHardwareEvent>) -> Result<(), BridgeError> {
        if self.server_handle.lock().map(|h| h.is_some()).unwrap_or(false) {
            return Ok(());
        }
        if let Ok(mut guard) = self.shared.tx.lock() {
            *guard = Some(tx);
        }
        let settings = self.settings.lock().map(|s| s.clone()).unwrap_or_default();
        let addr = format!("{}:{}", settings.host, settings.port);
        let path = settings.path.clone();
        let shared = self.shared.clone();
        let name = self.name.clone();

        let router = Router::new().route(&path, post(handle_event)).with_state(shared);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| BridgeError::Adapter(format!("webhook {name} bind {addr}: {e}")))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(adapter = %name, error = %e, "webhook listener exited");
            }
        });
        if let Ok(mut h) = self.server_handle.lock() {
            *h = Some(handle);
        }
        Ok(())
    }

    async fn stop_listening(&self) -> Result<(), BridgeError> {
        if let Ok(mut h) = self.server_handle.lock() {
            if let Some(handle) = h.take() {
                handle.abort();
            }
        }
        if let Ok(mut tx) = self.shared.tx.lock() {
            *tx = None;
        }
        Ok(())
    }

    async fn unlock_door(&self, _duration_ms: u64) -> Result<(), BridgeError> {
        Err(BridgeError::Adapter(super::UNLOCK_NOT_SUPPORTED.to_owned()))
    }

    fn status(&self) -> AdapterStatus {
        self.status.lock().map(|s| s.clone()).unwrap_or_else(|_| AdapterStatus::new(self.name.clone(), AdapterState::Error))
    }

    fn healthy(&self) -> bool {
        self.server_handle.lock().map(|h| h.is_some()).unwrap_or(false)
    }
}

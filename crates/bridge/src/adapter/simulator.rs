// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Simulator adapter: generates events on a periodic tick from a configured
//! user list, supports manual trigger, and simulates unlock with a scheduled
//! re-lock log. Always reaches `active` state after `initialize`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::HardwareAdapter;
use crate::error::BridgeError;
use crate::model::{AdapterState, AdapterStatus, EventKind, RawHardwareEvent};

#[derive(Debug, Clone, Deserialize)]
struct SimulatorSettings {
    #[serde(default = "default_users")]
    users: Vec<String>,
    #[serde(default = "default_tick_ms")]
    tick_interval_ms: u64,
}

fn default_users() -> Vec<String> {
    vec!["u1".to_owned()]
}

fn default_tick_ms() -> u64 {
    5_000
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self { users: default_users(), tick_interval_ms: default_tick_ms() }
    }
}

pub struct SimulatorAdapter {
    name: String,
    settings: Mutex<SimulatorSettings>,
    status: Mutex<AdapterStatus>,
    listening: AtomicBool,
    tick_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatorAdapter {
    pub fn new(name: String) -> Self {
        let status = AdapterStatus::new(name.clone(), AdapterState::Disabled);
        Self {
            name,
            settings: Mutex::new(SimulatorSettings::default()),
            status: Mutex::new(status),
            listening: AtomicBool::new(false),
            tick_handle: Mutex::new(None),
        }
    }

    /// Manual trigger affordance for tests and operator tooling: emits one
    /// event immediately for `external_user_id` without waiting for a tick.
    pub async fn trigger(&self, tx: &mpsc::Sender<RawHardwareEvent>, external_user_id: &str, kind: EventKind) {
        let event = RawHardwareEvent {
            external_user_id: external_user_id.to_owned(),
            timestamp: crate::model::chrono_compat::Timestamp::now(),
            kind,
            attributes: simulated_attributes(&self.name),
        };
        let _ = tx.send(event).await;
        if let Ok(mut status) = self.status.lock() {
            status.last_event = Some(crate::model::chrono_compat::Timestamp::now());
            status.updated_at = crate::model::chrono_compat::Timestamp::now();
        }
    }
}

fn simulated_attributes(adapter_name: &str) -> HashMap<String, serde_json::Value> {
    let mut attrs = HashMap::new();
    attrs.insert("simulated".to_owned(), serde_json::Value::Bool(true));
    attrs.insert("adapter".to_owned(), serde_json::Value::String(format!("simulator:{adapter_name}")));
    attrs
}

#[async_trait]
impl HardwareAdapter for SimulatorAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self, settings: serde_json::Value) -> Result<(), BridgeError> {
        let parsed: SimulatorSettings = if settings.is_null() {
            SimulatorSettings::default()
        } else {
            serde_json::from_value(settings)
                .map_err(|e| BridgeError::Validation(format!("simulator settings: {e}")))?
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
        if self.listening.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let interval_ms = self.settings.lock().map(|s| s.tick_interval_ms).unwrap_or(default_tick_ms());
        let name = self.name.clone();
        let settings = Arc::new(Mutex::new(self.settings.lock().map(|s| s.clone()).unwrap_or_default()));
        let cursor = Arc::new(Mutex::new(0usize));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(interval_ms));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let user = {
                    let settings = match settings.lock() {
                        Ok(s) => s,
                        Err(_) => break,
                    };
                    if settings.users.is_empty() {
                        continue;
                    }
                    let mut cursor = match cursor.lock() {
                        Ok(c) => c,
                        Err(_) => break,
                    };
                    let user = settings.users[*cursor % settings.users.len()].clone();
                    *cursor += 1;
                    user
                };
                let event = RawHardwareEvent {
                    external_user_id: user,
                    timestamp: crate::model::chrono_compat::Timestamp::now(),
                    kind: EventKind::Entry,
                    attributes: simulated_attributes(&name),
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        if let Ok(mut h) = self.tick_handle.lock() {
            *h = Some(handle);
        }
        Ok(())
    }

    async fn stop_listening(&self) -> Result<(), BridgeError> {
        self.listening.store(false, Ordering::SeqCst);
        if let Ok(mut h) = self.tick_handle.lock() {
            if let Some(handle) = h.take() {
                handle.abort();
            }
        }
        Ok(())
    }

    async fn unlock_door(&self, duration_ms: u64) -> Result<(), BridgeError> {
        let name = self.name.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(duration_ms)).await;
            tracing::info!(adapter = %name, duration_ms, "simulated re-lock");
        });
        Ok(())
    }

    fn status(&self) -> AdapterStatus {
        self.status.lock().map(|s| s.clone()).unwrap_or_else(|_| AdapterStatus::new(self.name.clone(), AdapterState::Error))
    }

    fn healthy(&self) -> bool {
        self.listening.load(Ordering::SeqCst) || self.status().state == AdapterState::Active
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Framework skeleton for RFID and fingerprint adapters: wired to a device
//! path and a protocol identifier from the fixed supported set. Real
//! protocol decoding is out of scope here (the concrete
//! wire/frame format as hardware-specific); this module establishes the
//! lifecycle and fails closed on misconfiguration.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;

use super::HardwareAdapter;
use crate::error::BridgeError;
use crate::model::{AdapterState, AdapterStatus, RawHardwareEvent};

/// Which framed-device family this instance represents; only used for
/// labeling, since the lifecycle and protocol set are shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Rfid,
    Fingerprint,
}

impl DeviceKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Rfid => "rfid",
            Self::Fingerprint => "fingerprint",
        }
    }
}

/// The fixed supported protocol set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Wiegand,
    Rs485,
    Tcp,
    UsbHid,
    Serial,
}

#[derive(Debug, Clone, Deserialize)]
struct FramedDeviceSettings {
    device_path: String,
    protocol: Protocol,
}

pub struct FramedDeviceAdapter {
    name: String,
    kind: DeviceKind,
    status: Mutex<AdapterStatus>,
    settings: Mutex<Option<FramedDeviceSettings>>,
}

impl FramedDeviceAdapter {
    pub fn new(name: String, kind: DeviceKind) -> Self {
        Self {
            status: Mutex::new(AdapterStatus::new(name.clone(), AdapterState::Disabled)),
            name,
            kind,
            settings: Mutex::new(None),
        }
    }
}

#[async_trait]
impl HardwareAdapter for FramedDeviceAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self, settings: serde_json::Value) -> Result<(), BridgeError> {
        let parsed: FramedDeviceSettings = serde_json::from_value(settings)
            .map_err(|e| BridgeError::Validation(format!("{} settings: {e}", self.kind.as_str())))?;
        if parsed.device_path.trim().is_empty() {
            return Err(BridgeError::Validation(format!("{} requires a non-empty device path", self.kind.as_str())));
        }
        if let Ok(mut status) = self.status.lock() {
            status.state = AdapterState::Initializing;
            status.updated_at = crate::model::chrono_compat::Timestamp::now();
        }
        if let Ok(mut s) = self.settings.lock() {
            *s = Some(parsed);
        }
        // A real driver would open the device path here. This skeleton goes
        // straight to `active`; hardware faults surface via `unhealthy()`
        // transitions the real driver would drive through `status`.
        if let Ok(mut status) = self.status.lock() {
            status.state = AdapterState::Active;
            status.updated_at = crate::model::chrono_compat::Timestamp::now();
        }
        Ok(())
    }

    async fn start_listening(&self, _tx: mpsc::Sender<RawHardwareEvent>) -> Result<(), BridgeError> {
        if self.settings.lock().map(|s| s.is_none()).unwrap_or(true) {
            return Err(BridgeError::Adapter(format!("{} not initialized", self.kind.as_str())));
        }
        Ok(())
    }

    async fn stop_listening(&self) -> Result<(), BridgeError> {
        Ok(())
    }

    async fn unlock_door(&self, _duration_ms: u64) -> Result<(), BridgeError> {
        Err(BridgeError::Adapter(super::UNLOCK_NOT_SUPPORTED.to_owned()))
    }

    fn status(&self) -> AdapterStatus {
        self.status
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|_| AdapterStatus::new(self.name.clone(), AdapterState::Error))
    }

    fn healthy(&self) -> bool {
        self.status().state == AdapterState::Active
    }
}

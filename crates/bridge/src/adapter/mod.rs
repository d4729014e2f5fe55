// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hardware adapter contract and the process-wide kind registry. Concrete
//! adapters live in sibling modules; the manager (see `crate::manager`)
//! owns the live set and never touches a kind registration directly.

pub mod rfid;
pub mod simulator;
pub mod webhook;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::BridgeError;
use crate::model::{AdapterConfig, AdapterStatus, RawHardwareEvent};

/// A specific, named failure returned by `unlock_door` when the adapter has
/// no physical unlock capability, so the manager can try the next one.
pub const UNLOCK_NOT_SUPPORTED: &str = "unlock not supported by this adapter";

/// The uniform hardware interface every concrete driver implements. Implementors MUST be
/// re-entrant under concurrent `status()` reads; only one listener loop may
/// run at a time per instance.
#[async_trait]
pub trait HardwareAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Validates and applies `settings`. Called once before `start_listening`.
    async fn initialize(&self, settings: serde_json::Value) -> Result<(), BridgeError>;

    /// Begins emitting `RawHardwareEvent`s on `tx`. Idempotent: calling twice
    /// while already listening is a no-op, not an error.
    async fn start_listening(&self, tx: mpsc::Sender<RawHardwareEvent>) -> Result<(), BridgeError>;

    async fn stop_listening(&self) -> Result<(), BridgeError>;

    /// Attempts to unlock for `duration_ms`. Adapters without physical
    /// unlock return `Err(BridgeError::Adapter(UNLOCK_NOT_SUPPORTED.into()))`.
    async fn unlock_door(&self, duration_ms: u64) -> Result<(), BridgeError>;

    fn status(&self) -> AdapterStatus;

    fn healthy(&self) -> bool;
}

/// A factory closure producing a fresh adapter instance for a given name.
pub type AdapterFactory = Arc<dyn Fn(String) -> Arc<dyn HardwareAdapter> + Send + Sync>;

/// Process-wide mapping from adapter kind (`"simulator"`, `"rfid"`, ...) to a
/// constructor closure. Initialize before any `AdapterManager` exists;
/// Treated as immutable once a manager has loaded from it.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: Arc<Mutex<HashMap<String, AdapterFactory>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the built-in kinds: `simulator`, `webhook`, `rfid`,
    /// `fingerprint`. Plugins add further kinds with `register`.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register("simulator", |name| Arc::new(simulator::SimulatorAdapter::new(name)));
        registry.register("webhook", |name| Arc::new(webhook::WebhookAdapter::new(name)));
        registry.register("rfid", |name| Arc::new(rfid::FramedDeviceAdapter::new(name, rfid::DeviceKind::Rfid)));
        registry.register("fingerprint", |name| {
            Arc::new(rfid::FramedDeviceAdapter::new(name, rfid::DeviceKind::Fingerprint))
        });
        registry
    }

    pub fn register<F>(&self, kind: &str, factory: F)
    where
        F: Fn(String) -> Arc<dyn HardwareAdapter> + Send + Sync + 'static,
    {
        if let Ok(mut factories) = self.factories.lock() {
            factories.insert(kind.to_owned(), Arc::new(factory));
        }
    }

    /// Lookup by unknown kind is a soft error: callers log and continue.
    pub fn construct(&self, kind: &str, name: &str) -> Option<Arc<dyn HardwareAdapter>> {
        let factories = self.factories.lock().ok()?;
        factories.get(kind).map(|f| f(name.to_owned()))
    }
}

/// Convenience bundle passed to adapters that need config at construction.
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub config: AdapterConfig,
}

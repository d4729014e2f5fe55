// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owns the live set of adapters keyed by name, fans their events into a
//! single callback, and implements the first-fit unlock policy.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::adapter::{AdapterRegistry, HardwareAdapter};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::model::{AdapterConfig, AdapterStatus, RawHardwareEvent};

/// Callback invoked for every raw event fanned in from any adapter. Installed
/// once, at construction, by the coordinator.
pub type EventCallback = Arc<dyn Fn(RawHardwareEvent) + Send + Sync>;

struct LoadedAdapter {
    adapter: Arc<dyn HardwareAdapter>,
    config: AdapterConfig,
}

pub struct AdapterManager {
    registry: AdapterRegistry,
    adapters: RwLock<Vec<(String, LoadedAdapter)>>,
    callback: EventCallback,
    shutdown: CancellationToken,
    health_interval: std::time::Duration,
}

impl AdapterManager {
    pub fn new(registry: AdapterRegistry, callback: EventCallback, shutdown: CancellationToken) -> Self {
        Self {
            registry,
            adapters: RwLock::new(Vec::new()),
            callback,
            shutdown,
            health_interval: std::time::Duration::from_secs(30),
        }
    }

    /// Loads every enabled config; per-adapter init failures are logged and
    /// skipped, never aborting the batch.
    pub async fn load_all(&self, configs: &[(String, AdapterConfig)]) {
        for (kind, config) in configs {
            if !config.enabled {
                continue;
            }
            let Some(adapter) = self.registry.construct(kind, &config.name) else {
                tracing::warn!(kind = %kind, adapter = %config.name, "unknown adapter kind, skipping");
                continue;
            };
            if let Err(e) = adapter.initialize(config.settings.clone()).await {
                tracing::error!(adapter = %config.name, error = %e, "adapter initialize failed, skipping");
                continue;
            }
            if let Ok(mut adapters) = self.adapters.write() {
                adapters.push((config.name.clone(), LoadedAdapter { adapter, config: config.clone() }));
            }
        }
    }

    /// Starts every loaded adapter's listener loop, fanning its events into
    /// the shared callback. One adapter failing to start never stops another.
    pub async fn start_all(&self) -> Result<(), BridgeError> {
        let snapshot: Vec<(String, Arc<dyn HardwareAdapter>)> = self
            .adapters
            .read()
            .map_err(|_| BridgeError::Integrity("adapter map lock poisoned".into()))?
            .iter()
            .map(|(name, loaded)| (name.clone(), loaded.adapter.clone()))
            .collect();

        let mut errors = Vec::new();
        for (name, adapter) in snapshot {
            let (tx, mut rx) = mpsc::channel::<RawHardwareEvent>(256);
            if let Err(e) = adapter.start_listening(tx).await {
                tracing::error!(adapter = %name, error = %e, "adapter failed to start");
                errors.push(format!("{name}: {e}"));
                continue;
            }
            let callback = self.callback.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        event = rx.recv() => match event {
                            Some(event) => callback(event),
                            None => break,
                        }
                    }
                }
            });
        }

        self.spawn_health_sampler();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::Adapter(errors.join("; ")))
        }
    }

    fn spawn_health_sampler(&self) {
        let adapters = self.snapshot_adapters();
        let shutdown = self.shutdown.clone();
        let interval = self.health_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        for (name, adapter) in &adapters {
                            if !adapter.healthy() {
                                tracing::warn!(adapter = %name, "adapter unhealthy on periodic sample");
                            }
                        }
                    }
                }
            }
        });
    }

    fn snapshot_adapters(&self) -> Vec<(String, Arc<dyn HardwareAdapter>)> {
        self.adapters
            .read()
            .map(|a| a.iter().map(|(n, l)| (n.clone(), l.adapter.clone())).collect())
            .unwrap_or_default()
    }

    /// Stops every adapter, aggregating errors; one failure doesn't stop the
    /// rest.
    pub async fn stop_all(&self) -> Result<(), BridgeError> {
        let snapshot = self.snapshot_adapters();
        let mut errors = Vec::new();
        for (name, adapter) in snapshot {
            if let Err(e) = adapter.stop_listening().await {
                tracing::error!(adapter = %name, error = %e, "adapter failed to stop");
                errors.push(format!("{name}: {e}"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::Adapter(errors.join("; ")))
        }
    }

    /// First-fit unlock policy: explicit `adapter_name` pins the target;
    /// otherwise iterate in insertion order, skip unhealthy adapters, return
    /// on the first success, else the last error, else "no healthy adapters".
    pub async fn unlock_door(&self, adapter_name: Option<&str>, duration_ms: u64) -> Result<String, BridgeError> {
        let snapshot = self.snapshot_adapters();

        if let Some(name) = adapter_name {
            let Some((_, adapter)) = snapshot.iter().find(|(n, _)| n == name) else {
                return Err(BridgeError::NotFound(format!("adapter {name} not registered")));
            };
            if !adapter.healthy() {
                return Err(BridgeError::Adapter(format!("adapter {name} is not healthy")));
            }
            adapter.unlock_door(duration_ms).await?;
            return Ok(name.to_owned());
        }

        let mut saw_healthy = false;
        let mut last_error: Option<BridgeError> = None;
        for (name, adapter) in &snapshot {
            if !adapter.healthy() {
                continue;
            }
            saw_healthy = true;
            match adapter.unlock_door(duration_ms).await {
                Ok(()) => return Ok(name.clone()),
                Err(e) => last_error = Some(e),
            }
        }
        if !saw_healthy {
            return Err(BridgeError::Adapter("no healthy adapters".into()));
        }
        Err(last_error.unwrap_or_else(|| BridgeError::Adapter("no adapter accepted unlock".into())))
    }

    /// Stops, removes, reconstructs, and (if enabled) restarts a single named
    /// adapter, without disturbing the others.
    pub async fn reload(&self, kind: &str, config: AdapterConfig) -> Result<(), BridgeError> {
        let existing = {
            let mut adapters = self.adapters.write().map_err(|_| BridgeError::Integrity("adapter map lock poisoned".into()))?;
            adapters.iter().position(|(name, _)| name == &config.name).map(|idx| adapters.remove(idx))
        };
        if let Some((_, loaded)) = existing {
            loaded.adapter.stop_listening().await?;
        }

        if !config.enabled {
            return Ok(());
        }

        let Some(adapter) = self.registry.construct(kind, &config.name) else {
            return Err(BridgeError::Validation(format!("unknown adapter kind {kind}")));
        };
        adapter.initialize(config.settings.clone()).await?;

        let (tx, mut rx) = mpsc::channel::<RawHardwareEvent>(256);
        adapter.start_listening(tx).await?;
        let callback = self.callback.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => callback(event),
                        None => break,
                    }
                }
            }
        });

        if let Ok(mut adapters) = self.adapters.write() {
            adapters.push((config.name.clone(), LoadedAdapter { adapter, config }));
        }
        Ok(())
    }

    pub fn statuses(&self) -> Vec<AdapterStatus> {
        self.adapters.read().map(|a| a.iter().map(|(_, l)| l.adapter.status()).collect()).unwrap_or_default()
    }

    pub fn all_healthy(&self) -> bool {
        self.adapters.read().map(|a| a.iter().all(|(_, l)| l.adapter.healthy())).unwrap_or(true)
    }

    pub fn any_healthy(&self) -> bool {
        self.adapters.read().map(|a| a.iter().any(|(_, l)| l.adapter.healthy())).unwrap_or(false)
    }

    pub fn adapter_count(&self) -> usize {
        self.adapters.read().map(|a| a.len()).unwrap_or(0)
    }
}

/// Builds the `(kind, AdapterConfig)` list the manager loads from, from
/// `BridgeConfig`'s `enabledAdapters` + `adapterConfigs` maps.
pub fn configs_from_bridge_config(config: &BridgeConfig) -> Vec<(String, AdapterConfig)> {
    config
        .enabled_adapters
        .iter()
        .map(|name| {
            let mut adapter_config = config.adapter_configs.get(name).cloned().unwrap_or_default();
            adapter_config.name = name.clone();
            (name.clone(), adapter_config)
        })
        .collect()
}

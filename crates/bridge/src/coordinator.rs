// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owns one context tree and starts/stops every component in dependency
//! order: tier detection, the durable queue, adapters, health, door
//! control, and cloud submission, all behind one `CancellationToken`.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::adapter::AdapterRegistry;
use crate::client::AuthenticatedClient;
use crate::config::BridgeConfig;
use crate::door::DoorController;
use crate::health::HealthMonitor;
use crate::manager::{configs_from_bridge_config, AdapterManager, EventCallback};
use crate::model::{chrono_compat::Timestamp, DeviceIdentity, RawHardwareEvent};
use crate::processor::EventProcessor;
use crate::queue::DurableQueue;
use crate::submission::SubmissionService;
use crate::tier::TierDetector;

/// Shutdown budget per component.
const COMPONENT_SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

pub struct BridgeCoordinator {
    pub queue: Arc<DurableQueue>,
    pub processor: Arc<EventProcessor>,
    pub manager: Arc<AdapterManager>,
    pub tier_detector: Arc<TierDetector>,
    pub health_monitor: Arc<HealthMonitor>,
    pub door_controller: Arc<DoorController>,
    pub submission: Arc<SubmissionService>,
    pub client: Arc<AuthenticatedClient>,
    shutdown: CancellationToken,
    device_id: String,
    current_config: std::sync::Mutex<BridgeConfig>,
}

impl BridgeCoordinator {
    /// Startup order: DB → Queue → Processor → AdapterManager(load) →
    /// TierDetector → HealthMonitor → DoorController → SubmissionService →
    /// AdapterManager(start). Any failure propagates up; components already
    /// started are stopped in reverse order.
    pub async fn start(config: &BridgeConfig, identity: Option<DeviceIdentity>) -> anyhow::Result<Arc<Self>> {
        let shutdown = CancellationToken::new();
        let device_id = identity.as_ref().map(|i| i.device_id.clone()).unwrap_or_else(|| "unpaired".to_owned());

        let tier_detector = Arc::new(TierDetector::new());
        let effective_tier = config.tier;
        let capacity = config.effective_queue_capacity(0);

        let queue = Arc::new(DurableQueue::open(&config.database_path, capacity)?);
        queue.set_overflow_policy(effective_tier.overflow_policy());

        let processor = Arc::new(EventProcessor::new(
            device_id.clone(),
            queue.clone(),
            config.dedup_enabled,
            config.dedup_window(),
        ));

        let registry = AdapterRegistry::with_builtins();
        let processor_for_callback = processor.clone();
        let callback: EventCallback = Arc::new(move |raw: RawHardwareEvent| {
            route_event(&processor_for_callback, raw);
        });
        let manager = Arc::new(AdapterManager::new(registry, callback, shutdown.clone()));
        let adapter_configs = configs_from_bridge_config(config);
        manager.load_all(&adapter_configs).await;

        let health_monitor = Arc::new(HealthMonitor::new(queue.clone(), manager.clone(), tier_detector.clone(), capacity));
        let door_controller = Arc::new(DoorController::new(manager.clone(), config.unlock_duration));

        let mut client = AuthenticatedClient::new(config.server_url.clone());
        if let Some(identity) = &identity {
            client = client.with_credentials(identity.device_id.clone(), identity.device_key.clone());
        }
        let client = Arc::new(client);
        let submission = Arc::new(SubmissionService::new(queue.clone(), client.clone(), effective_tier));

        if let Err(e) = manager.start_all().await {
            tracing::error!(error = %e, "one or more adapters failed to start");
        }

        let submission_task = submission.clone();
        let submission_shutdown = shutdown.clone();
        tokio::spawn(async move { submission_task.run(submission_shutdown).await });

        let tier_task = tier_detector.clone();
        let tier_shutdown = shutdown.clone();
        tokio::spawn(async move { tier_task.run(tier_shutdown).await });

        let gc_queue = queue.clone();
        let gc_shutdown = shutdown.clone();
        let retention_hours = config.queue_retention_hours;
        let failed_retention_days = config.queue_failed_retention_days;
        let gc_interval = std::time::Duration::from_secs(effective_tier.submission_interval_secs() * 10);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(gc_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = gc_shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        match gc_queue.gc(retention_hours, failed_retention_days) {
                            Ok(n) if n > 0 => tracing::info!(rows = n, "queue GC swept terminal rows"),
                            Ok(_) => {}
                            Err(e) => tracing::error!(error = %e, "queue GC failed"),
                        }
                    }
                }
            }
        });

        Ok(Arc::new(Self {
            queue,
            processor,
            manager,
            tier_detector,
            health_monitor,
            door_controller,
            submission,
            client,
            shutdown,
            device_id,
            current_config: std::sync::Mutex::new(config.clone()),
        }))
    }

    /// Builds the combined local HTTP router: door control, health, and
    /// the admin surfaces (stats, queue inspection, config reload).
    pub fn router(self: &Arc<Self>) -> axum::Router {
        let admin = axum::Router::new()
            .route("/stats", axum::routing::get(stats_handler))
            .route("/queue", axum::routing::get(queue_handler))
            .route("/reload", axum::routing::post(reload_handler))
            .with_state(self.clone());

        axum::Router::new()
            .merge(self.door_controller.clone().router())
            .merge(self.health_monitor.clone().router())
            .merge(admin)
            .layer(CorsLayer::permissive())
    }

    pub async fn serve(self: &Arc<Self>, host: &str, port: u16) -> anyhow::Result<()> {
        let listener = TcpListener::bind(format!("{host}:{port}")).await?;
        let shutdown = self.shutdown.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
        Ok(())
    }

    /// Re-reads and applies the safe-field subset of a new config (log
    /// level, tier, heartbeat interval, enabled adapters, API server bind),
    /// per the "Configuration lifecycle" design note. Unsafe fields require
    /// a process restart.
    pub async fn reload_config(&self, old: &BridgeConfig, new: &BridgeConfig) -> Vec<&'static str> {
        let changed = old.diff_safe_fields(new);
        if changed.contains(&"tier") {
            self.submission.set_tier(new.tier);
            self.health_monitor.set_capacity(new.effective_queue_capacity(self.queue.depth().unwrap_or(0)));
            self.queue.set_capacity(new.effective_queue_capacity(self.queue.depth().unwrap_or(0)));
            self.queue.set_overflow_policy(new.tier.overflow_policy());
        }
        if changed.contains(&"enabledAdapters") {
            let adapter_configs = configs_from_bridge_config(new);
            for (kind, config) in adapter_configs {
                if let Err(e) = self.manager.reload(&kind, config.clone()).await {
                    tracing::error!(adapter = %config.name, error = %e, "adapter reload failed");
                }
            }
        }
        changed
    }

    /// Merged stats snapshot across components, for the optional `GET /stats`
    /// admin surface.
    pub fn stats(&self) -> serde_json::Value {
        let queue_stats = self.queue.stats().ok();
        let processor_stats = self.processor.stats();
        let (unlock_count, last_unlock) = self.door_controller.stats();
        serde_json::json!({
            "deviceId": self.device_id,
            "tier": self.tier_detector.tier(),
            "queue": queue_stats.map(|s| serde_json::json!({
                "depth": s.depth, "pending": s.pending, "inFlight": s.in_flight,
                "sent": s.sent, "failed": s.failed,
            })),
            "processor": {
                "totalProcessed": processor_stats.total_processed,
                "totalDuplicates": processor_stats.total_duplicates,
                "totalInvalid": processor_stats.total_invalid,
            },
            "unlockCount": unlock_count,
            "lastUnlock": last_unlock.map(|t| t.to_rfc3339_nanos()),
        })
    }

    /// Shutdown follows reverse startup order with a per-component timeout;
    /// errors are aggregated but never block later steps.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let _ = tokio::time::timeout(COMPONENT_SHUTDOWN_TIMEOUT, self.manager.stop_all()).await;
    }
}

async fn stats_handler(axum::extract::State(coordinator): axum::extract::State<Arc<BridgeCoordinator>>) -> axum::Json<serde_json::Value> {
    axum::Json(coordinator.stats())
}

async fn queue_handler(
    axum::extract::State(coordinator): axum::extract::State<Arc<BridgeCoordinator>>,
) -> Result<axum::Json<Vec<crate::model::QueuedEvent>>, crate::error::BridgeError> {
    let rows = coordinator.queue.query(None, 100)?;
    Ok(axum::Json(rows))
}

async fn reload_handler(
    axum::extract::State(coordinator): axum::extract::State<Arc<BridgeCoordinator>>,
    axum::Json(new_config): axum::Json<BridgeConfig>,
) -> Result<axum::Json<serde_json::Value>, crate::error::BridgeError> {
    let old_config = coordinator
        .current_config
        .lock()
        .map_err(|_| crate::error::BridgeError::Integrity("config lock poisoned".into()))?
        .clone();
    let changed = coordinator.reload_config(&old_config, &new_config).await;
    if let Ok(mut current) = coordinator.current_config.lock() {
        *current = new_config;
    }
    Ok(axum::Json(serde_json::json!({ "changed": changed })))
}

fn route_event(processor: &Arc<EventProcessor>, raw: RawHardwareEvent) {
    match processor.process(&raw) {
        crate::processor::ProcessOutcome::Enqueued(_) => {}
        crate::processor::ProcessOutcome::EnqueueFailed { event, error } => {
            tracing::error!(error = %error, event_id = %event.event_id, "enqueue failed, event dropped at the hot path");
        }
        crate::processor::ProcessOutcome::Rejected { reason } => {
            tracing::debug!(reason = %reason, external_user_id = %raw.external_user_id, "event rejected by processor");
        }
    }
}

/// Builds a `HealthSnapshot` for the heartbeat client call.
pub fn health_snapshot_for(coordinator: &BridgeCoordinator) -> crate::client::HealthSnapshot {
    let report = coordinator.health_monitor.report();
    crate::client::HealthSnapshot {
        status: format!("{:?}", report.status).to_lowercase(),
        tier: report.tier,
        queue_depth: report.queue_depth,
        cpu_percent: report.cpu_percent,
        memory_percent: report.memory_percent,
        last_event_time: coordinator.processor.stats().last_processed.map(|t| t.to_rfc3339_nanos()),
    }
}

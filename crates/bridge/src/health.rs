// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aggregated system status: composite health from queue depth, adapter
//! state, and resource utilization, exposed as JSON over `GET /health`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::manager::AdapterManager;
use crate::queue::DurableQueue;
use crate::tier::TierDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Healthy,
    Degraded,
    Unhealthy,
}

impl Status {
    fn http_status(&self) -> StatusCode {
        match self {
            Self::Healthy | Self::Degraded => StatusCode::OK,
            Self::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: Status,
    #[serde(rename = "queueDepth")]
    pub queue_depth: u64,
    #[serde(rename = "queueCapacity")]
    pub queue_capacity: u64,
    #[serde(rename = "adaptersHealthy")]
    pub adapters_healthy: bool,
    #[serde(rename = "cpuPercent")]
    pub cpu_percent: f32,
    #[serde(rename = "memoryPercent")]
    pub memory_percent: f32,
    pub tier: crate::model::Tier,
}

impl IntoResponse for HealthReport {
    fn into_response(self) -> Response {
        let status = self.status.http_status();
        (status, Json(self)).into_response()
    }
}

pub struct HealthMonitor {
    queue: Arc<DurableQueue>,
    manager: Arc<AdapterManager>,
    tier_detector: Arc<TierDetector>,
    capacity: std::sync::atomic::AtomicU64,
}

impl HealthMonitor {
    pub fn new(queue: Arc<DurableQueue>, manager: Arc<AdapterManager>, tier_detector: Arc<TierDetector>, capacity: u64) -> Self {
        Self { queue, manager, tier_detector, capacity: std::sync::atomic::AtomicU64::new(capacity) }
    }

    pub fn set_capacity(&self, capacity: u64) {
        self.capacity.store(capacity, std::sync::atomic::Ordering::Relaxed);
    }

    /// Composite status derived from queue depth, adapter health, and resource usage:
    ///   healthy: depth < 50% cap, all adapters active, CPU < 80%, mem < 80%.
    ///   degraded: depth ≥ 50% cap, OR ≥1 adapter errored while others active,
    ///             OR 80% ≤ resource < 95%.
    ///   unhealthy: depth read error, all adapters errored, or resource ≥ 95%.
    pub fn report(&self) -> HealthReport {
        let capacity = self.capacity.load(std::sync::atomic::Ordering::Relaxed).max(1);
        let depth_result = self.queue.depth();
        let sample = self.tier_detector.last_sample();
        let adapter_count = self.manager.adapter_count();
        let any_healthy = self.manager.any_healthy();
        let all_healthy = self.manager.all_healthy();

        let Ok(depth) = depth_result else {
            return HealthReport {
                status: Status::Unhealthy,
                queue_depth: 0,
                queue_capacity: capacity,
                adapters_healthy: false,
                cpu_percent: sample.cpu_percent,
                memory_percent: sample.memory_percent,
                tier: self.tier_detector.tier(),
            };
        };

        let depth_ratio = depth as f64 / capacity as f64;
        let resource_peak = sample.cpu_percent.max(sample.memory_percent);

        let status = if adapter_count > 0 && !any_healthy {
            Status::Unhealthy
        } else if resource_peak >= 95.0 {
            Status::Unhealthy
        } else if depth_ratio >= 0.5 || (adapter_count > 0 && !all_healthy) || (80.0..95.0).contains(&resource_peak) {
            Status::Degraded
        } else if depth_ratio < 0.5 && all_healthy && resource_peak < 80.0 {
            Status::Healthy
        } else {
            Status::Degraded
        };

        HealthReport {
            status,
            queue_depth: depth,
            queue_capacity: capacity,
            adapters_healthy: all_healthy,
            cpu_percent: sample.cpu_percent,
            memory_percent: sample.memory_percent,
            tier: self.tier_detector.tier(),
        }
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new().route("/health", get(health_handler)).with_state(self)
    }
}

async fn health_handler(State(monitor): State<Arc<HealthMonitor>>) -> HealthReport {
    monitor.report()
}

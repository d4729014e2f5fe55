// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tier detector: samples CPU cores, total RAM, and recent utilization every
//! 30 s via `sysinfo`, mapping to `{lite, normal, full}` by the fixed table
//! elsewhere. Demotion is allowed; queue capacity enforcement (never
//! below current depth) lives in `BridgeConfig::effective_queue_capacity`.

use std::sync::{Arc, RwLock};

use sysinfo::System;
use tokio_util::sync::CancellationToken;

use crate::model::Tier;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceSample {
    pub cpu_cores: usize,
    pub total_ram_bytes: u64,
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

pub struct TierDetector {
    system: std::sync::Mutex<System>,
    current: RwLock<Tier>,
    last_sample: RwLock<ResourceSample>,
}

impl TierDetector {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        system.refresh_memory();
        let sample = sample_from(&system);
        let tier = Tier::from_resources(sample.cpu_cores, sample.total_ram_bytes);
        Self { system: std::sync::Mutex::new(system), current: RwLock::new(tier), last_sample: RwLock::new(sample) }
    }

    pub fn tier(&self) -> Tier {
        self.current.read().map(|t| *t).unwrap_or(Tier::Normal)
    }

    pub fn last_sample(&self) -> ResourceSample {
        self.last_sample.read().map(|s| *s).unwrap_or_default()
    }

    fn sample_once(&self) -> ResourceSample {
        let mut system = match self.system.lock() {
            Ok(s) => s,
            Err(_) => return self.last_sample(),
        };
        system.refresh_cpu_all();
        system.refresh_memory();
        let sample = sample_from(&system);
        if let Ok(mut current) = self.current.write() {
            *current = Tier::from_resources(sample.cpu_cores, sample.total_ram_bytes);
        }
        if let Ok(mut last) = self.last_sample.write() {
            *last = sample;
        }
        sample
    }

    /// Runs the 30 s sampling ticker until `shutdown` fires.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(30));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.sample_once();
                }
            }
        }
    }
}

impl Default for TierDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn sample_from(system: &System) -> ResourceSample {
    let cpu_cores = system.cpus().len().max(1);
    let total_ram_bytes = system.total_memory();
    let used_ram = system.used_memory();
    let memory_percent = if total_ram_bytes > 0 { (used_ram as f32 / total_ram_bytes as f32) * 100.0 } else { 0.0 };
    let cpu_percent = if system.cpus().is_empty() {
        0.0
    } else {
        system.cpus().iter().map(|c| c.cpu_usage()).sum::<f32>() / system.cpus().len() as f32
    };
    ResourceSample { cpu_cores, total_ram_bytes, cpu_percent, memory_percent }
}

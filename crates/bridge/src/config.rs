// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-layer configuration: process-level flags (`BridgeArgs`) parsed by
//! `clap`, and the domain config file (`BridgeConfig`) parsed from YAML.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::model::{AdapterConfig, Tier};

/// Process-level arguments: `clap::Args` with env fallback on every flag.
#[derive(Debug, Clone, clap::Parser)]
pub struct BridgeArgs {
    /// Path to the domain config file.
    #[arg(long, env = "BRIDGE_CONFIG", default_value = "./bridge.yaml")]
    pub config: PathBuf,

    /// Overrides `logLevel` from the config file, if set.
    #[arg(long, env = "BRIDGE_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// The YAML-backed domain config loaded from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    pub server_url: String,
    #[serde(default = "default_tier")]
    pub tier: Tier,
    #[serde(default = "default_queue_max_size")]
    pub queue_max_size: u64,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    #[serde(default = "default_unlock_duration")]
    pub unlock_duration: u64,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub enabled_adapters: Vec<String>,
    #[serde(default)]
    pub adapter_configs: HashMap<String, AdapterConfig>,
    #[serde(default)]
    pub api_server: ApiServerConfig,
    #[serde(default)]
    pub updates_enabled: bool,
    #[serde(default = "default_queue_retention_hours")]
    pub queue_retention_hours: u64,
    #[serde(default = "default_queue_failed_retention_days")]
    pub queue_failed_retention_days: u64,
    #[serde(default = "default_true")]
    pub dedup_enabled: bool,
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub tls_enabled: bool,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,
    #[serde(default = "default_write_timeout")]
    pub write_timeout: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
            tls_enabled: false,
            tls_cert: None,
            tls_key: None,
            read_timeout: default_read_timeout(),
            write_timeout: default_write_timeout(),
            idle_timeout: default_idle_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_tier() -> Tier {
    Tier::Normal
}
fn default_queue_max_size() -> u64 {
    10_000
}
fn default_heartbeat_interval() -> u64 {
    60
}
fn default_unlock_duration() -> u64 {
    3_000
}
fn default_database_path() -> PathBuf {
    PathBuf::from("./bridge-queue.sqlite3")
}
fn default_log_level() -> LogLevel {
    LogLevel::Info
}
fn default_host() -> String {
    "127.0.0.1".to_owned()
}
fn default_port() -> u16 {
    8081
}
fn default_read_timeout() -> u64 {
    30
}
fn default_write_timeout() -> u64 {
    30
}
fn default_idle_timeout() -> u64 {
    120
}
fn default_queue_retention_hours() -> u64 {
    24
}
fn default_queue_failed_retention_days() -> u64 {
    30
}
fn default_dedup_window_secs() -> i64 {
    300
}

impl BridgeConfig {
    /// Load and validate from a YAML file. Missing optional fields fall back
    /// to the defaults above so a minimal file (just `serverUrl`) is valid.
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Integrity(format!("reading config {}: {e}", path.display())))?;
        let config: Self = serde_yaml::from_str(&raw)
            .map_err(|e| BridgeError::Validation(format!("parsing config {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), BridgeError> {
        if self.server_url.trim().is_empty() {
            return Err(BridgeError::Validation("serverUrl must not be empty".into()));
        }
        if self.queue_max_size == 0 {
            return Err(BridgeError::Validation("queueMaxSize must be > 0".into()));
        }
        if self.heartbeat_interval == 0 {
            return Err(BridgeError::Validation("heartbeatInterval must be > 0".into()));
        }
        if self.unlock_duration == 0 {
            return Err(BridgeError::Validation("unlockDuration must be > 0".into()));
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval)
    }

    pub fn unlock_duration(&self) -> Duration {
        Duration::from_millis(self.unlock_duration)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs.unsigned_abs())
    }

    /// Ceiling enforcement: config can only shrink the tier-derived
    /// capacity, and never below `floor` (the current depth).
    pub fn effective_queue_capacity(&self, floor: u64) -> u64 {
        let tier_capacity = self.tier.queue_capacity() as u64;
        let capped = self.queue_max_size.min(tier_capacity);
        capped.max(floor)
    }

    /// Safe-field diff used by hot reload: only these fields are re-applied
    /// live; everything else requires a process restart.
    pub fn diff_safe_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.log_level != other.log_level {
            changed.push("logLevel");
        }
        if self.tier != other.tier {
            changed.push("tier");
        }
        if self.heartbeat_interval != other.heartbeat_interval {
            changed.push("heartbeatInterval");
        }
        if self.enabled_adapters != other.enabled_adapters {
            changed.push("enabledAdapters");
        }
        if self.api_server.host != other.api_server.host || self.api_server.port != other.api_server.port {
            changed.push("apiServer");
        }
        changed
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire-shape types shared by every stage of the event pipeline, plus the
//! adapter/device/tier types the rest of the crate keys off of.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An event kind emitted by hardware at the point of presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Entry,
    Exit,
    Denied,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
            Self::Denied => "denied",
        }
    }
}

/// A raw value in an adapter's free-form attribute map.
pub type AttributeMap = HashMap<String, serde_json::Value>;

/// What an adapter emits for a single presentation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHardwareEvent {
    pub external_user_id: String,
    pub timestamp: chrono_compat::Timestamp,
    pub kind: EventKind,
    #[serde(default)]
    pub attributes: AttributeMap,
}

impl RawHardwareEvent {
    /// Validation rules: non-empty external id, timestamp within
    /// [now-24h, now+1h], kind in the closed set (already enforced by the type).
    pub fn validate(&self) -> Result<(), ValidationFailure> {
        if self.external_user_id.trim().is_empty() {
            return Err(ValidationFailure::field("external_user_id"));
        }
        let now = chrono_compat::Timestamp::now();
        let lower = now.minus_seconds(24 * 3600);
        let upper = now.plus_seconds(3600);
        if self.timestamp < lower || self.timestamp > upper {
            return Err(ValidationFailure::field("timestamp"));
        }
        Ok(())
    }

    /// True if `simulated=true` is set, or `adapter` mentions "simulator" (case-insensitive).
    pub fn is_simulated(&self) -> bool {
        if let Some(serde_json::Value::Bool(true)) = self.attributes.get("simulated") {
            return true;
        }
        self.attributes
            .get("adapter")
            .and_then(|v| v.as_str())
            .is_some_and(|s| s.to_lowercase().contains("simulator"))
    }
}

/// A field that failed validation, used to build the `validation:<field>` reason string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure(pub &'static str);

impl ValidationFailure {
    pub fn field(name: &'static str) -> Self {
        Self(name)
    }

    pub fn reason(&self) -> String {
        format!("validation:{}", self.0)
    }
}

/// What the pipeline produces and the queue stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardEvent {
    pub event_id: String,
    pub external_user_id: String,
    pub internal_user_id: Option<String>,
    pub timestamp: chrono_compat::Timestamp,
    pub kind: EventKind,
    pub attributes: AttributeMap,
    pub simulated: bool,
    pub device_id: String,
}

/// Deterministic event id: `evt_<first 8 of device id>_<first 16 hex of sha256>`.
///
/// The hash covers device id, external id, kind, RFC3339-nanos timestamp, and
/// canonical (key-sorted) JSON of the attribute map, so re-processing the same
/// raw event is idempotent.
pub fn derive_event_id(device_id: &str, raw: &RawHardwareEvent) -> String {
    let canonical_attrs = canonicalize_attributes(&raw.attributes);
    let mut hasher = Sha256::new();
    hasher.update(device_id.as_bytes());
    hasher.update(raw.external_user_id.as_bytes());
    hasher.update(raw.kind.as_str().as_bytes());
    hasher.update(raw.timestamp.to_rfc3339_nanos().as_bytes());
    hasher.update(canonical_attrs.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    let device_prefix: String = device_id.chars().take(8).collect();
    format!("evt_{device_prefix}_{}", &hex[..16])
}

/// Canonical JSON rendering of an attribute map: keys sorted, no whitespace.
fn canonicalize_attributes(attrs: &AttributeMap) -> String {
    let mut keys: Vec<&String> = attrs.keys().collect();
    keys.sort();
    let ordered: serde_json::Map<String, serde_json::Value> =
        keys.into_iter().map(|k| (k.clone(), attrs[k].clone())).collect();
    serde_json::Value::Object(ordered).to_string()
}

/// Delivery state of a queued event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    InFlight,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_flight" => Some(Self::InFlight),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A queue row: a `StandardEvent` plus delivery bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedEvent {
    pub seq: i64,
    pub event: StandardEvent,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub first_seen: chrono_compat::Timestamp,
    pub last_attempt: Option<chrono_compat::Timestamp>,
    pub last_error: Option<String>,
}

/// Settings supplied to an adapter at `initialize`, validated by the adapter itself.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdapterConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub settings: serde_json::Value,
}

fn default_true() -> bool {
    true
}

/// Adapter lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterState {
    Disabled,
    Initializing,
    Active,
    Error,
}

/// Observable status of a registered adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterStatus {
    pub name: String,
    pub state: AdapterState,
    pub last_event: Option<chrono_compat::Timestamp>,
    pub last_error: Option<String>,
    pub updated_at: chrono_compat::Timestamp,
}

impl AdapterStatus {
    pub fn new(name: impl Into<String>, state: AdapterState) -> Self {
        Self { name: name.into(), state, last_event: None, last_error: None, updated_at: chrono_compat::Timestamp::now() }
    }
}

/// External id → internal id mapping, pushed out-of-band from the cloud catalog.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserMapping {
    pub external_id: String,
    pub internal_id: String,
    pub display_name: String,
    pub note: String,
}

/// Persistent pairing credentials (see `secret` module for storage).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub device_key: String,
}

/// Coarse resource class selecting queue capacity, batch size, and submit interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Lite,
    Normal,
    Full,
}

/// Overflow policy fixed per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    DropOldest,
    RefuseNew,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lite => "lite",
            Self::Normal => "normal",
            Self::Full => "full",
        }
    }

    pub fn queue_capacity(&self) -> usize {
        match self {
            Self::Lite => 1_000,
            Self::Normal => 10_000,
            Self::Full => 100_000,
        }
    }

    pub fn submission_batch_size(&self) -> usize {
        match self {
            Self::Lite => 10,
            Self::Normal => 50,
            Self::Full => 100,
        }
    }

    pub fn submission_interval_secs(&self) -> u64 {
        match self {
            Self::Lite => 60,
            Self::Normal => 30,
            Self::Full => 15,
        }
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        match self {
            Self::Lite => OverflowPolicy::DropOldest,
            Self::Normal | Self::Full => OverflowPolicy::RefuseNew,
        }
    }

    /// Fixed tier table: lite = CPU<2 or RAM<2 GiB; normal =
    /// CPU<4 or RAM<8 GiB; full = otherwise.
    pub fn from_resources(cpu_cores: usize, ram_bytes: u64) -> Self {
        const GIB: u64 = 1024 * 1024 * 1024;
        if cpu_cores < 2 || ram_bytes < 2 * GIB {
            Tier::Lite
        } else if cpu_cores < 4 || ram_bytes < 8 * GIB {
            Tier::Normal
        } else {
            Tier::Full
        }
    }
}

/// A tiny `chrono`-shaped timestamp so the rest of the crate doesn't take a
/// direct date/time dependency — built on `std::time` + RFC3339 rendering.
pub mod chrono_compat {
    use serde::{Deserialize, Serialize};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct Timestamp {
        secs: i64,
        nanos: u32,
    }

    impl Timestamp {
        pub fn now() -> Self {
            let d = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
            Self { secs: d.as_secs() as i64, nanos: d.subsec_nanos() }
        }

        pub fn from_unix_secs(secs: i64) -> Self {
            Self { secs, nanos: 0 }
        }

        pub fn unix_secs(&self) -> i64 {
            self.secs
        }

        pub fn plus_seconds(&self, secs: i64) -> Self {
            Self { secs: self.secs + secs, nanos: self.nanos }
        }

        pub fn minus_seconds(&self, secs: i64) -> Self {
            Self { secs: self.secs - secs, nanos: self.nanos }
        }

        pub fn diff_seconds(&self, other: &Self) -> i64 {
            self.secs - other.secs
        }

        pub fn to_rfc3339_nanos(&self) -> String {
            // Minimal RFC3339 rendering sufficient for canonicalization and wire
            // format; avoids pulling in a calendar crate for a single format.
            let days_since_epoch = self.secs.div_euclid(86_400);
            let secs_of_day = self.secs.rem_euclid(86_400);
            let (y, m, d) = civil_from_days(days_since_epoch);
            let h = secs_of_day / 3600;
            let mi = (secs_of_day % 3600) / 60;
            let s = secs_of_day % 60;
            format!("{y:04}-{m:02}-{d:02}T{h:02}:{mi:02}:{s:02}.{:09}Z", self.nanos)
        }

        pub fn to_duration_since_epoch(&self) -> Duration {
            Duration::new(self.secs.max(0) as u64, self.nanos)
        }
    }

    impl Default for Timestamp {
        fn default() -> Self {
            Self::now()
        }
    }

    /// Howard Hinnant's civil-from-days algorithm (public domain), used so
    /// rendering RFC3339 doesn't require a calendar dependency.
    fn civil_from_days(z: i64) -> (i64, u32, u32) {
        let z = z + 719_468;
        let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
        let doe = (z - era * 146_097) as u64;
        let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
        let y = yoe as i64 + era * 400;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
        let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
        let y = if m <= 2 { y + 1 } else { y };
        (y, m, d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(ext: &str, kind: EventKind, offset_secs: i64) -> RawHardwareEvent {
        RawHardwareEvent {
            external_user_id: ext.to_owned(),
            timestamp: chrono_compat::Timestamp::now().plus_seconds(offset_secs),
            kind,
            attributes: HashMap::new(),
        }
    }

    #[test]
    fn validate_rejects_blank_external_id() {
        let r = raw("  ", EventKind::Entry, 0);
        assert_eq!(r.validate(), Err(ValidationFailure::field("external_user_id")));
    }

    #[test]
    fn validate_rejects_timestamp_out_of_window() {
        let r = raw("u1", EventKind::Entry, -100_000);
        assert!(r.validate().is_err());
    }

    #[test]
    fn derive_event_id_is_deterministic() {
        let r = raw("u1", EventKind::Entry, 0);
        let a = derive_event_id("device-abc", &r);
        let b = derive_event_id("device-abc", &r);
        assert_eq!(a, b);
        assert!(a.starts_with("evt_device-a_"));
    }

    #[test]
    fn derive_event_id_differs_on_kind() {
        let r1 = raw("u1", EventKind::Entry, 0);
        let mut r2 = r1.clone();
        r2.kind = EventKind::Exit;
        assert_ne!(derive_event_id("d1", &r1), derive_event_id("d1", &r2));
    }

    #[test]
    fn is_simulated_detects_flag_and_adapter_name() {
        let mut r = raw("u1", EventKind::Entry, 0);
        r.attributes.insert("simulated".into(), serde_json::Value::Bool(true));
        assert!(r.is_simulated());

        let mut r2 = raw("u1", EventKind::Entry, 0);
        r2.attributes.insert("adapter".into(), serde_json::Value::String("Simulator-1".into()));
        assert!(r2.is_simulated());

        let r3 = raw("u1", EventKind::Entry, 0);
        assert!(!r3.is_simulated());
    }

    #[test]
    fn tier_from_resources_matches_table() {
        assert_eq!(Tier::from_resources(1, 4 * 1024 * 1024 * 1024), Tier::Lite);
        assert_eq!(Tier::from_resources(2, 1 * 1024 * 1024 * 1024), Tier::Lite);
        assert_eq!(Tier::from_resources(3, 4 * 1024 * 1024 * 1024), Tier::Normal);
        assert_eq!(Tier::from_resources(8, 16 * 1024 * 1024 * 1024), Tier::Full);
    }
}

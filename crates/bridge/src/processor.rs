// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transforms a `RawHardwareEvent` into a `StandardEvent` and hands it to the
//! queue: validate, dedup, derive id, resolve identity, flag simulated,
//! enqueue. Validate through enqueue runs under a single mutex so two
//! concurrent near-duplicate events can't both pass the dedup check and land
//! as separate rows — whichever caller gets the lock second sees the first
//! caller's row already in the queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::model::{chrono_compat::Timestamp, derive_event_id, EventKind, RawHardwareEvent, StandardEvent, UserMapping};
use crate::queue::DurableQueue;

/// Outcome of processing one raw event, including its fate in the queue.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    Enqueued(StandardEvent),
    EnqueueFailed { event: StandardEvent, error: String },
    Rejected { reason: String },
}

#[derive(Debug, Default, Clone)]
pub struct ProcessorStats {
    pub total_processed: u64,
    pub total_duplicates: u64,
    pub total_invalid: u64,
    pub last_processed: Option<Timestamp>,
}

pub struct EventProcessor {
    device_id: String,
    queue: Arc<DurableQueue>,
    mappings: RwLock<HashMap<String, UserMapping>>,
    dedup_enabled: bool,
    dedup_window: std::time::Duration,
    gate: Mutex<()>,
    processed: AtomicU64,
    duplicates: AtomicU64,
    invalid: AtomicU64,
    last_processed: Mutex<Option<Timestamp>>,
}

impl EventProcessor {
    pub fn new(device_id: String, queue: Arc<DurableQueue>, dedup_enabled: bool, dedup_window: std::time::Duration) -> Self {
        Self {
            device_id,
            queue,
            mappings: RwLock::new(HashMap::new()),
            dedup_enabled,
            dedup_window,
            gate: Mutex::new(()),
            processed: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            invalid: AtomicU64::new(0),
            last_processed: Mutex::new(None),
        }
    }

    pub fn set_mapping(&self, mapping: UserMapping) {
        if let Ok(mut mappings) = self.mappings.write() {
            mappings.insert(mapping.external_id.clone(), mapping);
        }
    }

    pub fn replace_mappings(&self, mappings: Vec<UserMapping>) {
        if let Ok(mut guard) = self.mappings.write() {
            guard.clear();
            for mapping in mappings {
                guard.insert(mapping.external_id.clone(), mapping);
            }
        }
    }

    /// Validate → dedup → derive-id → resolve-identity → simulated-flag →
    /// enqueue, all under `gate`. The enqueue happens before the lock is
    /// released, so a second caller's dedup lookup always sees the first
    /// caller's row.
    pub fn process(&self, raw: &RawHardwareEvent) -> ProcessOutcome {
        let _held = self.gate.lock().unwrap_or_else(|p| p.into_inner());

        if let Err(failure) = raw.validate() {
            self.invalid.fetch_add(1, Ordering::Relaxed);
            return ProcessOutcome::Rejected { reason: failure.reason() };
        }

        if self.dedup_enabled {
            let window_secs = self.dedup_window.as_secs() as i64;
            let window_start = raw.timestamp.minus_seconds(window_secs);
            let window_end = raw.timestamp.plus_seconds(window_secs);
            match self.queue.has_similar(&raw.external_user_id, raw.kind, window_start, window_end) {
                Ok(true) => {
                    self.duplicates.fetch_add(1, Ordering::Relaxed);
                    return ProcessOutcome::Rejected { reason: "duplicate".to_owned() };
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "dedup lookup failed, proceeding without it");
                }
            }
        }

        let event_id = derive_event_id(&self.device_id, raw);

        let internal_user_id = self
            .mappings
            .read()
            .ok()
            .and_then(|m| m.get(&raw.external_user_id).map(|m| m.internal_id.clone()));
        if internal_user_id.is_none() {
            tracing::warn!(external_user_id = %raw.external_user_id, "no mapping for external user id, leaving internal id empty");
        }

        let event = StandardEvent {
            event_id,
            external_user_id: raw.external_user_id.clone(),
            internal_user_id,
            timestamp: raw.timestamp,
            kind: raw.kind,
            attributes: raw.attributes.clone(),
            simulated: raw.is_simulated(),
            device_id: self.device_id.clone(),
        };

        self.processed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_processed.lock() {
            *last = Some(Timestamp::now());
        }

        match self.queue.enqueue(&event) {
            Ok(_) => ProcessOutcome::Enqueued(event),
            Err(e) => ProcessOutcome::EnqueueFailed { error: e.to_string(), event },
        }
    }

    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            total_processed: self.processed.load(Ordering::Relaxed),
            total_duplicates: self.duplicates.load(Ordering::Relaxed),
            total_invalid: self.invalid.load(Ordering::Relaxed),
            last_processed: self.last_processed.lock().ok().and_then(|l| *l),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw(ext: &str, offset_secs: i64) -> RawHardwareEvent {
        RawHardwareEvent {
            external_user_id: ext.to_owned(),
            timestamp: Timestamp::now().plus_seconds(offset_secs),
            kind: EventKind::Entry,
            attributes: HashMap::new(),
        }
    }

    fn processor() -> EventProcessor {
        let queue = Arc::new(DurableQueue::open_in_memory(100).unwrap());
        EventProcessor::new("device-1".into(), queue, true, std::time::Duration::from_secs(300))
    }

    #[test]
    fn processed_event_carries_device_and_derived_id() {
        let p = processor();
        match p.process(&raw("u1", 0)) {
            ProcessOutcome::Enqueued(event) => {
                assert_eq!(event.device_id, "device-1");
                assert!(event.event_id.starts_with("evt_"));
                assert!(event.internal_user_id.is_none());
            }
            other => panic!("expected enqueued, got {other:?}"),
        }
        assert_eq!(p.stats().total_processed, 1);
    }

    #[test]
    fn invalid_event_is_rejected_and_counted() {
        let p = processor();
        let mut r = raw("", 0);
        r.external_user_id = "  ".into();
        match p.process(&r) {
            ProcessOutcome::Rejected { reason } => assert_eq!(reason, "validation:external_user_id"),
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(p.stats().total_invalid, 1);
    }

    #[test]
    fn dedup_collapses_events_within_window() {
        let queue = Arc::new(DurableQueue::open_in_memory(100).unwrap());
        let p = EventProcessor::new("device-1".into(), queue.clone(), true, std::time::Duration::from_secs(300));
        match p.process(&raw("u1", 0)) {
            ProcessOutcome::Enqueued(_) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }

        match p.process(&raw("u1", 10)) {
            ProcessOutcome::Rejected { reason } => assert_eq!(reason, "duplicate"),
            other => panic!("expected duplicate rejection, got {other:?}"),
        }
        assert_eq!(p.stats().total_duplicates, 1);
        assert_eq!(queue.depth().unwrap(), 1);
    }

    #[test]
    fn resolve_identity_attaches_internal_id_on_hit() {
        let p = processor();
        p.set_mapping(UserMapping { external_id: "u1".into(), internal_id: "int-1".into(), display_name: "Alice".into(), note: String::new() });
        match p.process(&raw("u1", 0)) {
            ProcessOutcome::Enqueued(event) => assert_eq!(event.internal_user_id.as_deref(), Some("int-1")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn simulated_flag_set_from_attributes() {
        let p = processor();
        let mut r = raw("u1", 0);
        r.attributes.insert("simulated".into(), serde_json::Value::Bool(true));
        match p.process(&r) {
            ProcessOutcome::Enqueued(event) => assert!(event.simulated),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}

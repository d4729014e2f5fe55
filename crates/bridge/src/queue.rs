// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-safe, ordered, at-least-once event store backed by SQLite. Enqueue
//! and drain are serialized through a single mutex around the connection;
//! `drain`/`ack`/`nack` form a per-token transaction as required by the
//! concurrency model.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::BridgeError;
use crate::model::{chrono_compat::Timestamp, DeliveryStatus, EventKind, OverflowPolicy, QueuedEvent, StandardEvent};

/// Attempts beyond this threshold move an event from `pending` to `failed`.
const MAX_ATTEMPTS: u32 = 10;

/// A FIFO batch handed out by `drain`, pending `ack`/`nack`.
#[derive(Debug, Clone)]
pub struct DrainToken {
    pub id: String,
    pub seqs: Vec<i64>,
}

#[derive(Debug, Default, Clone)]
pub struct QueueStats {
    pub depth: u64,
    pub pending: u64,
    pub in_flight: u64,
    pub sent: u64,
    pub failed: u64,
    pub oldest_pending: Option<Timestamp>,
    pub last_sent: Option<Timestamp>,
    pub last_failure: Option<Timestamp>,
}

pub struct DurableQueue {
    conn: Mutex<Connection>,
    capacity: Mutex<u64>,
    overflow_policy: Mutex<OverflowPolicy>,
}

impl DurableQueue {
    /// Opens (creating if absent) the SQLite-backed queue at `path` and
    /// reverts any non-terminal row to `pending`, satisfying the crash
    /// recovery invariant: nothing is lost on restart.
    pub fn open(path: &Path, capacity: u64) -> Result<Self, BridgeError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id TEXT NOT NULL,
                external_user_id TEXT NOT NULL,
                internal_user_id TEXT,
                kind TEXT NOT NULL,
                ts_secs INTEGER NOT NULL,
                ts_nanos INTEGER NOT NULL,
                attributes TEXT NOT NULL,
                simulated INTEGER NOT NULL,
                device_id TEXT NOT NULL,
                status TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                first_seen_secs INTEGER NOT NULL,
                last_attempt_secs INTEGER,
                last_error TEXT,
                drain_token TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_events_status ON events(status);
            CREATE INDEX IF NOT EXISTS idx_events_dedup ON events(external_user_id, kind, ts_secs);",
        )
        .map_err(BridgeError::from)?;

        conn.execute(
            "UPDATE events SET status = 'pending', drain_token = NULL WHERE status = 'in_flight'",
            [],
        )
        .map_err(BridgeError::from)?;

        Ok(Self { conn: Mutex::new(conn), capacity: Mutex::new(capacity), overflow_policy: Mutex::new(OverflowPolicy::RefuseNew) })
    }

    /// Opens an in-memory queue, for tests.
    pub fn open_in_memory(capacity: u64) -> Result<Self, BridgeError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id TEXT NOT NULL,
                external_user_id TEXT NOT NULL,
                internal_user_id TEXT,
                kind TEXT NOT NULL,
                ts_secs INTEGER NOT NULL,
                ts_nanos INTEGER NOT NULL,
                attributes TEXT NOT NULL,
                simulated INTEGER NOT NULL,
                device_id TEXT NOT NULL,
                status TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                first_seen_secs INTEGER NOT NULL,
                last_attempt_secs INTEGER,
                last_error TEXT,
                drain_token TEXT
            );
            CREATE INDEX idx_events_status ON events(status);
            CREATE INDEX idx_events_dedup ON events(external_user_id, kind, ts_secs);",
        )
        .map_err(BridgeError::from)?;
        Ok(Self { conn: Mutex::new(conn), capacity: Mutex::new(capacity), overflow_policy: Mutex::new(OverflowPolicy::RefuseNew) })
    }

    pub fn set_capacity(&self, capacity: u64) {
        if let Ok(mut cap) = self.capacity.lock() {
            *cap = capacity;
        }
    }

    /// Sets the policy applied when `enqueue` finds the queue at capacity.
    pub fn set_overflow_policy(&self, policy: OverflowPolicy) {
        if let Ok(mut p) = self.overflow_policy.lock() {
            *p = policy;
        }
    }

    /// Appends `event`, durable before return (SQLite `synchronous=FULL`
    /// with WAL is the write barrier). At capacity, either evicts the
    /// oldest pending row (`DropOldest`) or refuses the new one
    /// (`RefuseNew`, returning `BridgeError::Capacity`), per the configured
    /// overflow policy.
    pub fn enqueue(&self, event: &StandardEvent) -> Result<i64, BridgeError> {
        let conn = self.conn.lock().map_err(|_| BridgeError::Integrity("queue lock poisoned".into()))?;
        let capacity = *self.capacity.lock().map_err(|_| BridgeError::Integrity("capacity lock poisoned".into()))?;
        let policy = *self.overflow_policy.lock().map_err(|_| BridgeError::Integrity("overflow policy lock poisoned".into()))?;

        let depth: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM events WHERE status IN ('pending', 'in_flight')",
                [],
                |row| row.get(0),
            )
            .map_err(BridgeError::from)?;
        if depth as u64 >= capacity {
            match policy {
                OverflowPolicy::RefuseNew => {
                    return Err(BridgeError::Capacity(format!("queue full at {capacity} events")));
                }
                OverflowPolicy::DropOldest => {
                    let oldest: Option<i64> = conn
                        .query_row(
                            "SELECT seq FROM events WHERE status = 'pending' ORDER BY seq ASC LIMIT 1",
                            [],
                            |row| row.get(0),
                        )
                        .optional()
                        .map_err(BridgeError::from)?;
                    match oldest {
                        Some(seq) => {
                            conn.execute("DELETE FROM events WHERE seq = ?1", params![seq]).map_err(BridgeError::from)?;
                            tracing::warn!(seq, "queue at capacity, dropped oldest pending event");
                        }
                        None => {
                            return Err(BridgeError::Capacity(format!("queue full at {capacity} events, nothing pending to drop")));
                        }
                    }
                }
            }
        }

        let attrs_json = serde_json::to_string(&event.attributes)
            .map_err(|e| BridgeError::Integrity(format!("serializing attributes: {e}")))?;
        let now = Timestamp::now();
        conn.execute(
            "INSERT INTO events (event_id, external_user_id, internal_user_id, kind, ts_secs, ts_nanos,
                attributes, simulated, device_id, status, attempts, first_seen_secs, last_attempt_secs, last_error, drain_token)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8, 'pending', 0, ?9, NULL, NULL, NULL)",
            params![
                event.event_id,
                event.external_user_id,
                event.internal_user_id,
                event.kind.as_str(),
                event.timestamp.unix_secs(),
                attrs_json,
                event.simulated as i64,
                event.device_id,
                now.unix_secs(),
            ],
        )
        .map_err(BridgeError::from)?;
        Ok(conn.last_insert_rowid())
    }

    /// Returns up to `batch_size` pending events in FIFO order (by `seq`),
    /// marks them in-flight, and returns a token for ack/nack.
    pub fn drain(&self, batch_size: usize) -> Result<(Vec<QueuedEvent>, DrainToken), BridgeError> {
        let conn = self.conn.lock().map_err(|_| BridgeError::Integrity("queue lock poisoned".into()))?;
        let token_id = Uuid::new_v4().to_string();

        let mut stmt = conn
            .prepare(
                "SELECT seq FROM events WHERE status = 'pending' ORDER BY seq ASC LIMIT ?1",
            )
            .map_err(BridgeError::from)?;
        let seqs: Vec<i64> = stmt
            .query_map(params![batch_size as i64], |row| row.get(0))
            .map_err(BridgeError::from)?
            .collect::<Result<_, _>>()
            .map_err(BridgeError::from)?;
        drop(stmt);

        if seqs.is_empty() {
            return Ok((Vec::new(), DrainToken { id: token_id, seqs }));
        }

        let placeholders = seqs.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "UPDATE events SET status = 'in_flight', drain_token = ? WHERE seq IN ({placeholders})"
        );
        let mut update_params: Vec<&dyn rusqlite::ToSql> = vec![&token_id];
        for s in &seqs {
            update_params.push(s);
        }
        conn.execute(&sql, update_params.as_slice()).map_err(BridgeError::from)?;

        let events = load_by_seqs(&conn, &seqs)?;
        Ok((events, DrainToken { id: token_id, seqs }))
    }

    /// Marks `sent_ids` (event ids, not seqs) as `sent`; any in-flight rows
    /// under the token not in `sent_ids` revert to `pending` with attempts
    /// bumped, matching `ack`'s partial-failure contract.
    pub fn ack(&self, token: &DrainToken, sent_ids: &[String]) -> Result<(), BridgeError> {
        let mut conn = self.conn.lock().map_err(|_| BridgeError::Integrity("queue lock poisoned".into()))?;
        let tx = conn.transaction().map_err(BridgeError::from)?;
        let now = Timestamp::now().unix_secs();

        for seq in &token.seqs {
            let event_id: String = tx
                .query_row("SELECT event_id FROM events WHERE seq = ?1", params![seq], |r| r.get(0))
                .map_err(BridgeError::from)?;
            if sent_ids.contains(&event_id) {
                tx.execute(
                    "UPDATE events SET status = 'sent', drain_token = NULL, last_attempt_secs = ?2 WHERE seq = ?1",
                    params![seq, now],
                )
                .map_err(BridgeError::from)?;
            } else {
                revert_to_pending_or_failed(&tx, *seq, now, None)?;
            }
        }
        tx.commit().map_err(BridgeError::from)?;
        Ok(())
    }

    /// Reverts every in-flight row under `token` to `pending` (or `failed`
    /// past the attempt threshold), bumping attempts and recording `error`.
    pub fn nack(&self, token: &DrainToken, error: &str) -> Result<(), BridgeError> {
        let mut conn = self.conn.lock().map_err(|_| BridgeError::Integrity("queue lock poisoned".into()))?;
        let tx = conn.transaction().map_err(BridgeError::from)?;
        let now = Timestamp::now().unix_secs();
        for seq in &token.seqs {
            revert_to_pending_or_failed(&tx, *seq, now, Some(error))?;
        }
        tx.commit().map_err(BridgeError::from)?;
        Ok(())
    }

    pub fn depth(&self) -> Result<u64, BridgeError> {
        let conn = self.conn.lock().map_err(|_| BridgeError::Integrity("queue lock poisoned".into()))?;
        let depth: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM events WHERE status IN ('pending', 'in_flight')",
                [],
                |row| row.get(0),
            )
            .map_err(BridgeError::from)?;
        Ok(depth as u64)
    }

    pub fn stats(&self) -> Result<QueueStats, BridgeError> {
        let conn = self.conn.lock().map_err(|_| BridgeError::Integrity("queue lock poisoned".into()))?;
        let mut counts: HashMap<String, u64> = HashMap::new();
        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM events GROUP BY status")
            .map_err(BridgeError::from)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)))
            .map_err(BridgeError::from)?;
        for row in rows {
            let (status, count) = row.map_err(BridgeError::from)?;
            counts.insert(status, count);
        }
        drop(stmt);

        let oldest_pending: Option<i64> = conn
            .query_row(
                "SELECT MIN(first_seen_secs) FROM events WHERE status = 'pending'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(BridgeError::from)?
            .flatten();
        let last_sent: Option<i64> = conn
            .query_row("SELECT MAX(last_attempt_secs) FROM events WHERE status = 'sent'", [], |row| row.get(0))
            .optional()
            .map_err(BridgeError::from)?
            .flatten();
        let last_failure: Option<i64> = conn
            .query_row("SELECT MAX(last_attempt_secs) FROM events WHERE status = 'failed'", [], |row| row.get(0))
            .optional()
            .map_err(BridgeError::from)?
            .flatten();

        let pending = *counts.get("pending").unwrap_or(&0);
        let in_flight = *counts.get("in_flight").unwrap_or(&0);
        Ok(QueueStats {
            depth: pending + in_flight,
            pending,
            in_flight,
            sent: *counts.get("sent").unwrap_or(&0),
            failed: *counts.get("failed").unwrap_or(&0),
            oldest_pending: oldest_pending.map(Timestamp::from_unix_secs),
            last_sent: last_sent.map(Timestamp::from_unix_secs),
            last_failure: last_failure.map(Timestamp::from_unix_secs),
        })
    }

    /// Dedup support: is there a stored event with the same external id and
    /// kind whose timestamp lies within `[window_start, window_end]`?
    pub fn has_similar(
        &self,
        external_id: &str,
        kind: EventKind,
        window_start: Timestamp,
        window_end: Timestamp,
    ) -> Result<bool, BridgeError> {
        let conn = self.conn.lock().map_err(|_| BridgeError::Integrity("queue lock poisoned".into()))?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM events WHERE external_user_id = ?1 AND kind = ?2
                 AND ts_secs BETWEEN ?3 AND ?4 AND status != 'failed'",
                params![external_id, kind.as_str(), window_start.unix_secs(), window_end.unix_secs()],
                |row| row.get(0),
            )
            .map_err(BridgeError::from)?;
        Ok(count > 0)
    }

    /// Operator affordance: rows matching `status` (or all, if `None`).
    pub fn query(&self, status: Option<DeliveryStatus>, limit: usize) -> Result<Vec<QueuedEvent>, BridgeError> {
        let conn = self.conn.lock().map_err(|_| BridgeError::Integrity("queue lock poisoned".into()))?;
        let seqs: Vec<i64> = match status {
            Some(s) => {
                let mut stmt = conn
                    .prepare("SELECT seq FROM events WHERE status = ?1 ORDER BY seq ASC LIMIT ?2")
                    .map_err(BridgeError::from)?;
                let rows = stmt
                    .query_map(params![s.as_str(), limit as i64], |row| row.get(0))
                    .map_err(BridgeError::from)?
                    .collect::<Result<_, _>>()
                    .map_err(BridgeError::from)?;
                rows
            }
            None => {
                let mut stmt = conn
                    .prepare("SELECT seq FROM events ORDER BY seq ASC LIMIT ?1")
                    .map_err(BridgeError::from)?;
                let rows = stmt
                    .query_map(params![limit as i64], |row| row.get(0))
                    .map_err(BridgeError::from)?
                    .collect::<Result<_, _>>()
                    .map_err(BridgeError::from)?;
                rows
            }
        };
        load_by_seqs(&conn, &seqs)
    }

    /// Operator affordance: deletes rows matching `status`.
    pub fn clear(&self, status: DeliveryStatus) -> Result<u64, BridgeError> {
        let conn = self.conn.lock().map_err(|_| BridgeError::Integrity("queue lock poisoned".into()))?;
        let deleted = conn
            .execute("DELETE FROM events WHERE status = ?1", params![status.as_str()])
            .map_err(BridgeError::from)?;
        Ok(deleted as u64)
    }

    /// Background GC: removes `sent` rows older than `retention_hours` and
    /// caps `failed` retention at `failed_retention_days`.
    pub fn gc(&self, retention_hours: u64, failed_retention_days: u64) -> Result<u64, BridgeError> {
        let conn = self.conn.lock().map_err(|_| BridgeError::Integrity("queue lock poisoned".into()))?;
        let now = Timestamp::now().unix_secs();
        let sent_cutoff = now - (retention_hours as i64) * 3600;
        let failed_cutoff = now - (failed_retention_days as i64) * 86_400;
        let sent_deleted = conn
            .execute(
                "DELETE FROM events WHERE status = 'sent' AND last_attempt_secs < ?1",
                params![sent_cutoff],
            )
            .map_err(BridgeError::from)?;
        let failed_deleted = conn
            .execute(
                "DELETE FROM events WHERE status = 'failed' AND last_attempt_secs < ?1",
                params![failed_cutoff],
            )
            .map_err(BridgeError::from)?;
        Ok((sent_deleted + failed_deleted) as u64)
    }
}

fn revert_to_pending_or_failed(
    tx: &rusqlite::Transaction,
    seq: i64,
    now: i64,
    error: Option<&str>,
) -> Result<(), BridgeError> {
    let attempts: u32 = tx
        .query_row("SELECT attempts FROM events WHERE seq = ?1", params![seq], |r| r.get(0))
        .map_err(BridgeError::from)?;
    let next_attempts = attempts + 1;
    let next_status = if next_attempts > MAX_ATTEMPTS { "failed" } else { "pending" };
    tx.execute(
        "UPDATE events SET status = ?2, drain_token = NULL, attempts = ?3, last_attempt_secs = ?4, last_error = ?5
         WHERE seq = ?1",
        params![seq, next_status, next_attempts, now, error],
    )
    .map_err(BridgeError::from)?;
    Ok(())
}

fn load_by_seqs(conn: &Connection, seqs: &[i64]) -> Result<Vec<QueuedEvent>, BridgeError> {
    let mut out = Vec::with_capacity(seqs.len());
    for seq in seqs {
        out.push(load_one(conn, *seq)?);
    }
    Ok(out)
}

fn load_one(conn: &Connection, seq: i64) -> Result<QueuedEvent, BridgeError> {
    conn.query_row(
        "SELECT seq, event_id, external_user_id, internal_user_id, kind, ts_secs, attributes, simulated,
                device_id, status, attempts, first_seen_secs, last_attempt_secs, last_error
         FROM events WHERE seq = ?1",
        params![seq],
        |row| {
            let attrs_json: String = row.get(6)?;
            let attrs = serde_json::from_str(&attrs_json).unwrap_or_default();
            let kind_str: String = row.get(4)?;
            let kind = match kind_str.as_str() {
                "entry" => EventKind::Entry,
                "exit" => EventKind::Exit,
                _ => EventKind::Denied,
            };
            let status_str: String = row.get(9)?;
            let status = DeliveryStatus::from_str(&status_str).unwrap_or(DeliveryStatus::Pending);
            Ok(QueuedEvent {
                seq: row.get(0)?,
                event: StandardEvent {
                    event_id: row.get(1)?,
                    external_user_id: row.get(2)?,
                    internal_user_id: row.get(3)?,
                    timestamp: Timestamp::from_unix_secs(row.get(5)?),
                    kind,
                    attributes: attrs,
                    simulated: row.get::<_, i64>(7)? != 0,
                    device_id: row.get(8)?,
                },
                status,
                attempts: row.get::<_, i64>(10)? as u32,
                first_seen: Timestamp::from_unix_secs(row.get(11)?),
                last_attempt: row.get::<_, Option<i64>>(12)?.map(Timestamp::from_unix_secs),
                last_error: row.get(13)?,
            })
        },
    )
    .map_err(BridgeError::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn sample_event(external_id: &str, kind: EventKind, ts_secs: i64) -> StandardEvent {
        StandardEvent {
            event_id: format!("evt_test_{external_id}_{ts_secs}"),
            external_user_id: external_id.to_owned(),
            internal_user_id: None,
            timestamp: Timestamp::from_unix_secs(ts_secs),
            kind,
            attributes: StdHashMap::new(),
            simulated: true,
            device_id: "device-1".into(),
        }
    }

    #[test]
    fn enqueue_and_drain_round_trip() {
        let q = DurableQueue::open_in_memory(10).unwrap();
        q.enqueue(&sample_event("u1", EventKind::Entry, 1000)).unwrap();
        assert_eq!(q.depth().unwrap(), 1);

        let (batch, token) = q.drain(10).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(q.stats().unwrap().in_flight, 1);

        q.ack(&token, &[batch[0].event.event_id.clone()]).unwrap();
        assert_eq!(q.depth().unwrap(), 0);
        assert_eq!(q.stats().unwrap().sent, 1);
    }

    #[test]
    fn nack_reverts_to_pending_and_bumps_attempts() {
        let q = DurableQueue::open_in_memory(10).unwrap();
        q.enqueue(&sample_event("u1", EventKind::Entry, 1000)).unwrap();
        let (_, token) = q.drain(10).unwrap();
        q.nack(&token, "connection refused").unwrap();

        let pending = q.query(Some(DeliveryStatus::Pending), 10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn repeated_nack_past_threshold_marks_failed() {
        let q = DurableQueue::open_in_memory(10).unwrap();
        q.enqueue(&sample_event("u1", EventKind::Entry, 1000)).unwrap();
        for _ in 0..=MAX_ATTEMPTS {
            let (batch, token) = q.drain(10).unwrap();
            if batch.is_empty() {
                break;
            }
            q.nack(&token, "still down").unwrap();
        }
        let failed = q.query(Some(DeliveryStatus::Failed), 10).unwrap();
        assert_eq!(failed.len(), 1);
    }

    #[test]
    fn enqueue_rejects_when_full() {
        let q = DurableQueue::open_in_memory(1).unwrap();
        q.enqueue(&sample_event("u1", EventKind::Entry, 1000)).unwrap();
        let err = q.enqueue(&sample_event("u2", EventKind::Entry, 1001)).unwrap_err();
        assert!(matches!(err, BridgeError::Capacity(_)));
    }

    #[test]
    fn drop_oldest_policy_evicts_to_make_room() {
        let q = DurableQueue::open_in_memory(2).unwrap();
        q.set_overflow_policy(OverflowPolicy::DropOldest);
        q.enqueue(&sample_event("u1", EventKind::Entry, 1000)).unwrap();
        q.enqueue(&sample_event("u2", EventKind::Entry, 1001)).unwrap();
        q.enqueue(&sample_event("u3", EventKind::Entry, 1002)).unwrap();

        assert_eq!(q.depth().unwrap(), 2);
        let remaining = q.query(Some(DeliveryStatus::Pending), 10).unwrap();
        let ids: Vec<&str> = remaining.iter().map(|r| r.event.external_user_id.as_str()).collect();
        assert_eq!(ids, vec!["u2", "u3"]);
    }

    #[test]
    fn has_similar_matches_within_window() {
        let q = DurableQueue::open_in_memory(10).unwrap();
        q.enqueue(&sample_event("u1", EventKind::Entry, 1000)).unwrap();
        assert!(q
            .has_similar("u1", EventKind::Entry, Timestamp::from_unix_secs(900), Timestamp::from_unix_secs(1100))
            .unwrap());
        assert!(!q
            .has_similar("u1", EventKind::Entry, Timestamp::from_unix_secs(2000), Timestamp::from_unix_secs(2100))
            .unwrap());
    }

    #[test]
    fn drain_preserves_fifo_order() {
        let q = DurableQueue::open_in_memory(10).unwrap();
        q.enqueue(&sample_event("u1", EventKind::Entry, 1000)).unwrap();
        q.enqueue(&sample_event("u2", EventKind::Entry, 1001)).unwrap();
        let (batch, _) = q.drain(10).unwrap();
        assert_eq!(batch[0].event.external_user_id, "u1");
        assert_eq!(batch[1].event.external_user_id, "u2");
    }

    #[test]
    fn gc_removes_old_sent_rows() {
        let q = DurableQueue::open_in_memory(10).unwrap();
        q.enqueue(&sample_event("u1", EventKind::Entry, 1000)).unwrap();
        let (batch, token) = q.drain(10).unwrap();
        q.ack(&token, &[batch[0].event.event_id.clone()]).unwrap();
        let deleted = q.gc(0, 30).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(q.stats().unwrap().sent, 0);
    }
}

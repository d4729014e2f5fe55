// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic batched drain with retries. Runs a tier-derived ticker; each
//! tick drains a batch, splits it into ≤100-event chunks, submits each, and
//! acks/nacks accordingly with exponential backoff on the next tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{AuthenticatedClient, CheckinEvent};
use crate::model::{QueuedEvent, Tier};
use crate::queue::{DrainToken, DurableQueue};

const CHUNK_SIZE: usize = 100;
const CHUNK_PAUSE: Duration = Duration::from_millis(100);
const BASE_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 300;

pub struct SubmissionService {
    queue: Arc<DurableQueue>,
    client: Arc<AuthenticatedClient>,
    tier: std::sync::RwLock<Tier>,
    backoff_secs: AtomicU64,
    consecutive_failures: AtomicU64,
}

impl SubmissionService {
    pub fn new(queue: Arc<DurableQueue>, client: Arc<AuthenticatedClient>, tier: Tier) -> Self {
        Self {
            queue,
            client,
            tier: std::sync::RwLock::new(tier),
            backoff_secs: AtomicU64::new(0),
            consecutive_failures: AtomicU64::new(0),
        }
    }

    pub fn set_tier(&self, tier: Tier) {
        if let Ok(mut t) = self.tier.write() {
            *t = tier;
        }
    }

    fn tier(&self) -> Tier {
        self.tier.read().map(|t| *t).unwrap_or(Tier::Normal)
    }

    /// Runs until `shutdown` is cancelled. Each tick interval is tier-derived
    /// but extended by the current backoff after a failed batch.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            let interval = Duration::from_secs(self.tier().submission_interval_secs())
                + Duration::from_secs(self.backoff_secs.load(Ordering::Relaxed));
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            if shutdown.is_cancelled() {
                break;
            }
            self.tick(&shutdown).await;
        }
    }

    /// One drain-submit-ack cycle, exposed directly for tests.
    pub async fn tick(&self, shutdown: &CancellationToken) {
        if !self.client.is_paired() {
            tracing::debug!("submission tick skipped: device not paired");
            return;
        }

        let batch_size = self.tier().submission_batch_size();
        let (batch, token) = match self.queue.drain(batch_size) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "drain failed");
                return;
            }
        };
        if batch.is_empty() {
            return;
        }

        let mut batch_failed = false;
        for chunk in batch.chunks(CHUNK_SIZE) {
            if shutdown.is_cancelled() {
                break;
            }
            match self.submit_chunk(chunk).await {
                Ok((processed, failed)) => {
                    if let Err(e) = self.queue.ack(&DrainToken { id: token.id.clone(), seqs: chunk_seqs(chunk) }, &processed) {
                        tracing::error!(error = %e, "ack failed");
                    }
                    if !failed.is_empty() {
                        tracing::warn!(count = failed.len(), "cloud reported per-event failures in chunk");
                    }
                }
                Err(e) => {
                    batch_failed = true;
                    if let Err(nack_err) =
                        self.queue.nack(&DrainToken { id: token.id.clone(), seqs: chunk_seqs(chunk) }, &e.to_string())
                    {
                        tracing::error!(error = %nack_err, "nack failed");
                    }
                    tracing::warn!(error = %e, "chunk submission failed, nacked for retry");
                }
            }
            if chunk.len() == CHUNK_SIZE {
                tokio::time::sleep(CHUNK_PAUSE).await;
            }
        }

        if batch_failed {
            let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
            let backoff = (BASE_BACKOFF_SECS * 2u64.saturating_pow(failures.min(32) as u32)).min(MAX_BACKOFF_SECS);
            self.backoff_secs.store(backoff, Ordering::Relaxed);
        } else {
            self.consecutive_failures.store(0, Ordering::Relaxed);
            self.backoff_secs.store(0, Ordering::Relaxed);
        }
    }

    async fn submit_chunk(&self, chunk: &[QueuedEvent]) -> Result<(Vec<String>, Vec<String>), crate::error::BridgeError> {
        let events: Vec<CheckinEvent> = chunk
            .iter()
            .map(|q| CheckinEvent {
                event_id: q.event.event_id.clone(),
                external_user_id: q.event.external_user_id.clone(),
                timestamp: q.event.timestamp.to_rfc3339_nanos(),
                event_type: q.event.kind.as_str().to_owned(),
                is_simulated: q.event.simulated,
                device_id: q.event.device_id.clone(),
            })
            .collect();
        let response = self.client.checkin(&events).await?;
        Ok((response.processed_ids, response.failed_ids))
    }
}

fn chunk_seqs(chunk: &[QueuedEvent]) -> Vec<i64> {
    chunk.iter().map(|q| q.seq).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{chrono_compat::Timestamp, EventKind, StandardEvent};
    use std::collections::HashMap;

    fn sample_event(external_id: &str) -> StandardEvent {
        StandardEvent {
            event_id: format!("evt_test_{external_id}"),
            external_user_id: external_id.to_owned(),
            internal_user_id: None,
            timestamp: Timestamp::now(),
            kind: EventKind::Entry,
            attributes: HashMap::new(),
            simulated: true,
            device_id: "device-1".into(),
        }
    }

    #[tokio::test]
    async fn tick_skips_when_unpaired() {
        let queue = Arc::new(DurableQueue::open_in_memory(10).unwrap());
        queue.enqueue(&sample_event("u1")).unwrap();
        let client = Arc::new(AuthenticatedClient::new("https://cloud.example.com".into()));
        let service = SubmissionService::new(queue.clone(), client, Tier::Normal);
        service.tick(&CancellationToken::new()).await;
        assert_eq!(queue.depth().unwrap(), 1);
    }

    #[tokio::test]
    async fn tick_is_noop_on_empty_queue() {
        let queue = Arc::new(DurableQueue::open_in_memory(10).unwrap());
        let client = Arc::new(AuthenticatedClient::new("https://cloud.example.com".into()).with_credentials("d1".into(), "k1".into()));
        let service = SubmissionService::new(queue.clone(), client, Tier::Normal);
        service.tick(&CancellationToken::new()).await;
        assert_eq!(queue.depth().unwrap(), 0);
    }

    #[test]
    fn tier_change_updates_batch_parameters() {
        let queue = Arc::new(DurableQueue::open_in_memory(10).unwrap());
        let client = Arc::new(AuthenticatedClient::new("https://cloud.example.com".into()));
        let service = SubmissionService::new(queue, client, Tier::Lite);
        assert_eq!(service.tier().submission_batch_size(), 10);
        service.set_tier(Tier::Full);
        assert_eq!(service.tier().submission_batch_size(), 100);
    }
}

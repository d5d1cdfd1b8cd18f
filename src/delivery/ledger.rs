//! Delivery ledger: messages sent but not yet acknowledged.
//!
//! The ledger lock is held for the whole of [`DeliveryLedger::dispatch`] and
//! [`DeliveryLedger::sweep`]. An acknowledgment therefore either lands before
//! a sweep starts (the entry is gone and never resent) or after it finishes
//! (the entry is removed regardless of any resend). An acknowledged entry is
//! never re-armed.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use super::channel::ChannelId;
use super::protocol::{MessageId, UrlShortenedPayload, encode_url_shortened};
use super::registry::ConnectionRegistry;

/// A sent-but-unacknowledged message.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDelivery {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub payload: UrlShortenedPayload,
    /// Number of sends so far, starting at 1.
    pub attempts: u32,
    pub last_attempt: DateTime<Utc>,
}

/// Resend policy applied by [`DeliveryLedger::sweep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: Duration::from_secs(30),
        }
    }
}

/// Outcome of one retry sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries resent during this sweep.
    pub resent: usize,
    /// Entries dropped after reaching the attempt limit.
    pub exhausted: usize,
    /// Entries dropped because their channel is gone.
    pub orphaned: usize,
    /// Entries dropped because the resend failed.
    pub failed: usize,
    /// Entries still pending after the sweep.
    pub retained: usize,
}

#[derive(Default)]
pub struct DeliveryLedger {
    entries: Mutex<HashMap<MessageId, PendingDelivery>>,
}

impl DeliveryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry with `attempts = 1` and `last_attempt = now`.
    pub async fn record(
        &self,
        message_id: MessageId,
        channel_id: ChannelId,
        payload: UrlShortenedPayload,
    ) {
        let mut entries = self.entries.lock().await;
        entries.insert(message_id, Self::first_attempt(message_id, channel_id, payload));
        metrics::gauge!("delivery_pending").set(entries.len() as f64);
    }

    /// Records the entry and performs the first send under one lock.
    ///
    /// No acknowledgment can be processed between the two steps. If the send
    /// fails the entry is removed again; the registry has already evicted the
    /// channel, so retrying would be pointless.
    pub async fn dispatch(
        &self,
        registry: &ConnectionRegistry,
        message_id: MessageId,
        channel_id: ChannelId,
        payload: UrlShortenedPayload,
    ) -> bool {
        let frame = match encode_url_shortened(message_id, &payload) {
            Ok(frame) => frame,
            Err(e) => {
                error!(%message_id, error = %e, "Failed to encode frame");
                return false;
            }
        };

        let mut entries = self.entries.lock().await;
        entries.insert(message_id, Self::first_attempt(message_id, channel_id, payload));

        let sent = registry.send(&channel_id, &frame).await;
        if !sent {
            entries.remove(&message_id);
        }

        metrics::gauge!("delivery_pending").set(entries.len() as f64);
        sent
    }

    /// Removes an entry. Unknown or already-retired ids are accepted silently.
    pub async fn acknowledge(&self, message_id: &MessageId) -> bool {
        let mut entries = self.entries.lock().await;
        let removed = entries.remove(message_id).is_some();
        metrics::gauge!("delivery_pending").set(entries.len() as f64);

        if removed {
            debug!(%message_id, "Delivery acknowledged");
        } else {
            debug!(%message_id, "Acknowledgment for unknown message ignored");
        }
        removed
    }

    /// Inspects every entry once and resends those that are due.
    ///
    /// Per entry, in order:
    /// 1. `attempts >= max_attempts`: dropped, terminal failure logged
    /// 2. channel no longer registered: dropped
    /// 3. last attempt more recent than `retry_delay`: kept unchanged
    /// 4. otherwise resent; success bumps `attempts`, failure drops the entry
    pub async fn sweep(
        &self,
        now: DateTime<Utc>,
        registry: &ConnectionRegistry,
        policy: RetryPolicy,
    ) -> SweepReport {
        let retry_delay = TimeDelta::from_std(policy.retry_delay).unwrap_or(TimeDelta::MAX);
        let mut entries = self.entries.lock().await;
        let mut report = SweepReport::default();

        let ids: Vec<MessageId> = entries.keys().copied().collect();
        for message_id in ids {
            let Some(entry) = entries.get(&message_id) else {
                continue;
            };
            let channel_id = entry.channel_id;
            let attempts = entry.attempts;
            let last_attempt = entry.last_attempt;

            if attempts >= policy.max_attempts {
                entries.remove(&message_id);
                warn!(
                    %message_id,
                    %channel_id,
                    attempts,
                    "Delivery exhausted: giving up after max attempts"
                );
                report.exhausted += 1;
                continue;
            }

            if !registry.exists(&channel_id).await {
                entries.remove(&message_id);
                debug!(%message_id, %channel_id, "Recipient channel gone, dropping delivery");
                report.orphaned += 1;
                continue;
            }

            if now.signed_duration_since(last_attempt) < retry_delay {
                report.retained += 1;
                continue;
            }

            let frame = match encode_url_shortened(message_id, &entries[&message_id].payload) {
                Ok(frame) => frame,
                Err(e) => {
                    entries.remove(&message_id);
                    error!(%message_id, error = %e, "Failed to encode frame, dropping delivery");
                    report.failed += 1;
                    continue;
                }
            };

            if registry.send(&channel_id, &frame).await {
                if let Some(entry) = entries.get_mut(&message_id) {
                    entry.attempts += 1;
                    entry.last_attempt = now;
                    debug!(%message_id, attempt = entry.attempts, "Delivery resent");
                }
                report.resent += 1;
                report.retained += 1;
            } else {
                entries.remove(&message_id);
                report.failed += 1;
            }
        }

        metrics::gauge!("delivery_pending").set(entries.len() as f64);
        report
    }

    pub async fn get(&self, message_id: &MessageId) -> Option<PendingDelivery> {
        self.entries.lock().await.get(message_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Drops every pending entry. Returns how many were dropped.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let dropped = entries.len();
        entries.clear();
        metrics::gauge!("delivery_pending").set(0.0);
        dropped
    }

    fn first_attempt(
        message_id: MessageId,
        channel_id: ChannelId,
        payload: UrlShortenedPayload,
    ) -> PendingDelivery {
        PendingDelivery {
            message_id,
            channel_id,
            payload,
            attempts: 1,
            last_attempt: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::channel::{ChannelState, MockChannelTransport, TransportError};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn payload() -> UrlShortenedPayload {
        UrlShortenedPayload::new("http://x/abc1234567")
    }

    fn counting_transport(sends: Arc<AtomicUsize>) -> MockChannelTransport {
        let mut transport = MockChannelTransport::new();
        transport.expect_state().return_const(ChannelState::Open);
        transport.expect_close().return_const(());
        transport.expect_send_text().returning(move |_| {
            sends.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        transport
    }

    fn no_delay(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            retry_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_record_starts_at_first_attempt() {
        let ledger = DeliveryLedger::new();
        let id = Uuid::new_v4();
        ledger.record(id, ChannelId::new(), payload()).await;

        let entry = ledger.get(&id).await.unwrap();
        assert_eq!(entry.attempts, 1);
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_acknowledge_is_idempotent() {
        let ledger = DeliveryLedger::new();
        let kept = Uuid::new_v4();
        let acked = Uuid::new_v4();
        ledger.record(kept, ChannelId::new(), payload()).await;
        ledger.record(acked, ChannelId::new(), payload()).await;

        assert!(ledger.acknowledge(&acked).await);
        assert!(!ledger.acknowledge(&acked).await);
        assert!(!ledger.acknowledge(&Uuid::new_v4()).await);

        assert_eq!(ledger.len().await, 1);
        assert!(ledger.get(&kept).await.is_some());
    }

    #[tokio::test]
    async fn test_dispatch_sends_once_and_records() {
        let sends = Arc::new(AtomicUsize::new(0));
        let registry = ConnectionRegistry::new();
        let channel = registry
            .register(Arc::new(counting_transport(sends.clone())))
            .await;
        let ledger = DeliveryLedger::new();
        let id = Uuid::new_v4();

        assert!(ledger.dispatch(&registry, id, channel, payload()).await);
        assert_eq!(sends.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.get(&id).await.unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn test_dispatch_failure_leaves_no_entry() {
        let registry = ConnectionRegistry::new();
        let ledger = DeliveryLedger::new();

        assert!(!ledger.dispatch(&registry, Uuid::new_v4(), ChannelId::new(), payload()).await);
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_sweep_keeps_entries_not_yet_due() {
        let sends = Arc::new(AtomicUsize::new(0));
        let registry = ConnectionRegistry::new();
        let channel = registry
            .register(Arc::new(counting_transport(sends.clone())))
            .await;
        let ledger = DeliveryLedger::new();
        ledger.record(Uuid::new_v4(), channel, payload()).await;

        let report = ledger
            .sweep(Utc::now(), &registry, RetryPolicy::default())
            .await;

        assert_eq!(report.retained, 1);
        assert_eq!(report.resent, 0);
        assert_eq!(sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sweep_resends_due_entry_once() {
        let sends = Arc::new(AtomicUsize::new(0));
        let registry = ConnectionRegistry::new();
        let channel = registry
            .register(Arc::new(counting_transport(sends.clone())))
            .await;
        let ledger = DeliveryLedger::new();
        let id = Uuid::new_v4();
        ledger.record(id, channel, payload()).await;

        let later = Utc::now() + TimeDelta::seconds(31);
        let report = ledger
            .sweep(later, &registry, RetryPolicy::default())
            .await;

        assert_eq!(report.resent, 1);
        assert_eq!(sends.load(Ordering::SeqCst), 1);

        let entry = ledger.get(&id).await.unwrap();
        assert_eq!(entry.attempts, 2);
        assert_eq!(entry.last_attempt, later);
    }

    #[tokio::test]
    async fn test_bounded_retry_terminates() {
        let sends = Arc::new(AtomicUsize::new(0));
        let registry = ConnectionRegistry::new();
        let channel = registry
            .register(Arc::new(counting_transport(sends.clone())))
            .await;
        let ledger = DeliveryLedger::new();
        ledger.record(Uuid::new_v4(), channel, payload()).await;

        let first = ledger.sweep(Utc::now(), &registry, no_delay(2)).await;
        assert_eq!(first.resent, 1);

        let second = ledger.sweep(Utc::now(), &registry, no_delay(2)).await;
        assert_eq!(second.exhausted, 1);
        assert!(ledger.is_empty().await);

        let third = ledger.sweep(Utc::now(), &registry, no_delay(2)).await;
        assert_eq!(third, SweepReport::default());
        assert_eq!(sends.load(Ordering::SeqCst), 1);
        assert!(registry.exists(&channel).await);
    }

    #[tokio::test]
    async fn test_sweep_drops_entries_for_missing_channel() {
        let registry = ConnectionRegistry::new();
        let ledger = DeliveryLedger::new();
        ledger.record(Uuid::new_v4(), ChannelId::new(), payload()).await;

        let report = ledger.sweep(Utc::now(), &registry, no_delay(5)).await;

        assert_eq!(report.orphaned, 1);
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_sweep_drops_entry_when_resend_fails() {
        let registry = ConnectionRegistry::new();
        let mut transport = MockChannelTransport::new();
        transport.expect_state().return_const(ChannelState::Open);
        transport.expect_close().return_const(());
        transport
            .expect_send_text()
            .returning(|_| Err(TransportError::QueueClosed));
        let channel = registry.register(Arc::new(transport)).await;
        let ledger = DeliveryLedger::new();
        ledger.record(Uuid::new_v4(), channel, payload()).await;

        let report = ledger.sweep(Utc::now(), &registry, no_delay(5)).await;

        assert_eq!(report.failed, 1);
        assert!(ledger.is_empty().await);
        assert!(!registry.exists(&channel).await);
    }

    #[tokio::test]
    async fn test_acknowledged_entry_is_never_resent() {
        let sends = Arc::new(AtomicUsize::new(0));
        let registry = ConnectionRegistry::new();
        let channel = registry
            .register(Arc::new(counting_transport(sends.clone())))
            .await;
        let ledger = Arc::new(DeliveryLedger::new());
        let id = Uuid::new_v4();
        ledger.record(id, channel, payload()).await;

        let acker = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.acknowledge(&id).await })
        };
        ledger.sweep(Utc::now(), &registry, no_delay(5)).await;
        acker.await.unwrap();

        assert!(ledger.get(&id).await.is_none());
        assert!(sends.load(Ordering::SeqCst) <= 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let ledger = DeliveryLedger::new();
        ledger.record(Uuid::new_v4(), ChannelId::new(), payload()).await;
        ledger.record(Uuid::new_v4(), ChannelId::new(), payload()).await;

        assert_eq!(ledger.clear().await, 2);
        assert!(ledger.is_empty().await);
    }
}

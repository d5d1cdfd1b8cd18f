//! Background timers driving the retry sweep and the liveness sweep.
//!
//! The two timers are independent tasks with their own intervals. Both stop
//! when the shared shutdown signal flips to `true`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use super::ledger::{DeliveryLedger, RetryPolicy, SweepReport};
use super::registry::{ConnectionRegistry, LivenessReport};

/// Spawns the periodic retry sweep over the ledger.
pub fn spawn_retry_scheduler(
    ledger: Arc<DeliveryLedger>,
    registry: Arc<ConnectionRegistry>,
    policy: RetryPolicy,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run_periodic("retry", interval, shutdown, move || {
        let ledger = ledger.clone();
        let registry = registry.clone();
        async move {
            let report = ledger.sweep(Utc::now(), &registry, policy).await;
            record_sweep(&report);
        }
    }))
}

/// Spawns the periodic liveness sweep over the registry.
pub fn spawn_liveness_monitor(
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    idle_threshold: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run_periodic("liveness", interval, shutdown, move || {
        let registry = registry.clone();
        async move {
            let report = registry.sweep_liveness(Utc::now(), idle_threshold).await;
            record_liveness(&report);
        }
    }))
}

async fn run_periodic<F, Fut>(
    name: &'static str,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    info!(timer = name, interval_ms = interval.as_millis() as u64, "Timer started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => tick().await,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!(timer = name, "Timer stopped");
}

fn record_sweep(report: &SweepReport) {
    metrics::counter!("delivery_resent_total").increment(report.resent as u64);
    metrics::counter!("delivery_exhausted_total").increment(report.exhausted as u64);
    metrics::counter!("delivery_dropped_total").increment((report.orphaned + report.failed) as u64);

    if report.resent + report.exhausted + report.orphaned + report.failed > 0 {
        debug!(
            resent = report.resent,
            exhausted = report.exhausted,
            orphaned = report.orphaned,
            failed = report.failed,
            retained = report.retained,
            "Retry sweep finished"
        );
    }
}

fn record_liveness(report: &LivenessReport) {
    if report.evicted + report.probed > 0 {
        debug!(
            inspected = report.inspected,
            evicted = report.evicted,
            probed = report.probed,
            "Liveness sweep finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::channel::{ChannelId, ChannelState, MockChannelTransport};
    use crate::delivery::protocol::UrlShortenedPayload;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_retry_scheduler_sweeps_and_stops() {
        let registry = Arc::new(ConnectionRegistry::new());
        let ledger = Arc::new(DeliveryLedger::new());
        ledger
            .record(
                Uuid::new_v4(),
                ChannelId::new(),
                UrlShortenedPayload::new("http://x/a"),
            )
            .await;

        let (tx, rx) = watch::channel(false);
        let handle = spawn_retry_scheduler(
            ledger.clone(),
            registry,
            RetryPolicy::default(),
            Duration::from_millis(10),
            rx,
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(ledger.is_empty().await);

        tx.send_replace(true);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_liveness_monitor_evicts_closed_channel() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut transport = MockChannelTransport::new();
        transport.expect_state().return_const(ChannelState::Closed);
        transport.expect_close().return_const(());
        registry.register(Arc::new(transport)).await;

        let (tx, rx) = watch::channel(false);
        let handle = spawn_liveness_monitor(
            registry.clone(),
            Duration::from_millis(10),
            Duration::from_secs(60),
            rx,
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(registry.count().await, 0);

        tx.send_replace(true);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_timer_stops_when_sender_dropped() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, rx) = watch::channel(false);
        let handle = spawn_liveness_monitor(
            registry,
            Duration::from_secs(3600),
            Duration::from_secs(60),
            rx,
        );

        drop(tx);
        handle.await.unwrap();
    }
}

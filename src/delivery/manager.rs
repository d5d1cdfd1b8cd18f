//! Delivery manager: the façade used by the HTTP layer and the transport.
//!
//! Owns the [`ConnectionRegistry`], the [`DeliveryLedger`] and the two
//! background timers. Constructed explicitly at startup and torn down with
//! [`DeliveryManager::shutdown`].

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use super::channel::{ChannelId, ChannelTransport};
use super::ledger::{DeliveryLedger, RetryPolicy, SweepReport};
use super::protocol::{ClientFrame, InboundFrame, UrlShortenedPayload, decode_client_frame};
use super::registry::{ConnectionRegistry, LivenessReport};
use super::scheduler::{spawn_liveness_monitor, spawn_retry_scheduler};

/// Channel selection when a delivery names no recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Deliver to the most recently connected channel.
    AnyChannel,
    /// Refuse the delivery.
    Disabled,
}

impl FromStr for FallbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "any" => Ok(FallbackPolicy::AnyChannel),
            "none" => Ok(FallbackPolicy::Disabled),
            other => Err(format!("unknown fallback policy '{other}', expected 'any' or 'none'")),
        }
    }
}

/// Tunables of the delivery subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySettings {
    pub retry: RetryPolicy,
    pub sweep_interval: Duration,
    pub liveness_interval: Duration,
    pub idle_threshold: Duration,
    pub fallback: FallbackPolicy,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            sweep_interval: Duration::from_secs(5),
            liveness_interval: Duration::from_secs(30),
            idle_threshold: Duration::from_secs(60),
            fallback: FallbackPolicy::AnyChannel,
        }
    }
}

/// Point-in-time snapshot for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    pub connected_channels: usize,
    pub pending_deliveries: usize,
    pub active_bindings: usize,
}

pub struct DeliveryManager {
    registry: Arc<ConnectionRegistry>,
    ledger: Arc<DeliveryLedger>,
    settings: DeliverySettings,
    shutdown_tx: watch::Sender<bool>,
    timers: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl DeliveryManager {
    /// Creates a manager without starting its timers.
    pub fn new(settings: DeliverySettings) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            ledger: Arc::new(DeliveryLedger::new()),
            settings,
            shutdown_tx,
            timers: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        }
    }

    /// Spawns the retry scheduler and the liveness monitor.
    ///
    /// Calling it again while timers run, or after shutdown, does nothing.
    pub async fn start(&self) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }

        let mut timers = self.timers.lock().await;
        if !timers.is_empty() {
            return;
        }

        timers.push(spawn_retry_scheduler(
            self.ledger.clone(),
            self.registry.clone(),
            self.settings.retry,
            self.settings.sweep_interval,
            self.shutdown_tx.subscribe(),
        ));
        timers.push(spawn_liveness_monitor(
            self.registry.clone(),
            self.settings.liveness_interval,
            self.settings.idle_threshold,
            self.shutdown_tx.subscribe(),
        ));

        info!(
            max_attempts = self.settings.retry.max_attempts,
            retry_delay_secs = self.settings.retry.retry_delay.as_secs(),
            sweep_interval_secs = self.settings.sweep_interval.as_secs(),
            "Delivery timers started"
        );
    }

    pub fn settings(&self) -> &DeliverySettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn ledger(&self) -> &Arc<DeliveryLedger> {
        &self.ledger
    }

    /// Registers a connected transport, optionally binding it to a recipient.
    pub async fn connect(
        &self,
        transport: Arc<dyn ChannelTransport>,
        recipient: Option<&str>,
    ) -> ChannelId {
        let id = self.registry.register(transport).await;
        if let Some(recipient) = recipient {
            self.registry.bind(recipient, &id).await;
        }
        id
    }

    /// Removes a channel after its transport closed. Idempotent.
    pub async fn disconnect(&self, id: &ChannelId) {
        self.registry.unregister(id).await;
    }

    /// Binds a recipient to a live channel. Returns `false` if the channel is gone.
    pub async fn bind(&self, recipient: &str, id: &ChannelId) -> bool {
        self.registry.bind(recipient, id).await
    }

    /// Delivers a shortened URL to a recipient's channel.
    ///
    /// Without a recipient the [`FallbackPolicy`] decides. Returns whether the
    /// first send succeeded; returns `false` when no channel can be resolved.
    /// Never waits for an acknowledgment.
    pub async fn deliver_to(&self, recipient: Option<&str>, payload: UrlShortenedPayload) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            return false;
        }

        let Some(channel_id) = self.resolve_channel(recipient).await else {
            debug!(recipient, "No channel available for delivery");
            metrics::counter!("delivery_unroutable_total").increment(1);
            return false;
        };

        let message_id = Uuid::new_v4();
        let sent = self
            .ledger
            .dispatch(&self.registry, message_id, channel_id, payload)
            .await;

        if sent {
            metrics::counter!("delivery_sent_total").increment(1);
            debug!(%message_id, %channel_id, "Delivery dispatched");
        }
        sent
    }

    /// Handles one inbound text frame from a channel.
    ///
    /// Acknowledgments retire the matching ledger entry. Any JSON object
    /// refreshes the channel's liveness. Malformed input is dropped; the
    /// channel is never closed because of it.
    pub async fn on_inbound_frame(&self, channel_id: &ChannelId, raw: &str) {
        let frame = match decode_client_frame(raw) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(%channel_id, error = %e, "Ignoring malformed frame");
                return;
            }
        };

        self.registry.touch(channel_id).await;

        match frame {
            InboundFrame::Known(ClientFrame::Acknowledgment { message_id }) => {
                if self.ledger.acknowledge(&message_id).await {
                    metrics::counter!("delivery_acknowledged_total").increment(1);
                }
            }
            InboundFrame::Known(ClientFrame::Heartbeat) => {}
            InboundFrame::Unrecognized { kind } => {
                debug!(%channel_id, kind = kind.as_deref(), "Ignoring unrecognized frame");
            }
        }
    }

    /// Runs one retry sweep immediately.
    pub async fn run_retry_sweep(&self, now: DateTime<Utc>) -> SweepReport {
        self.ledger
            .sweep(now, &self.registry, self.settings.retry)
            .await
    }

    /// Runs one liveness sweep immediately.
    pub async fn run_liveness_sweep(&self, now: DateTime<Utc>) -> LivenessReport {
        self.registry
            .sweep_liveness(now, self.settings.idle_threshold)
            .await
    }

    pub async fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            connected_channels: self.registry.count().await,
            pending_deliveries: self.ledger.len().await,
            active_bindings: self.registry.binding_count().await,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Resolves once [`Self::shutdown`] has been called.
    pub fn stopped(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown_tx.subscribe();
        async move {
            let _ = rx.wait_for(|stopped| *stopped).await;
        }
    }

    /// Stops the timers, force-closes every channel and clears all state.
    ///
    /// Timers are joined before any channel is evicted. Only the first call
    /// has an effect.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        self.shutdown_tx.send_replace(true);

        let timers: Vec<JoinHandle<()>> = self.timers.lock().await.drain(..).collect();
        for timer in timers {
            let _ = timer.await;
        }

        let evicted = self.registry.evict_all().await;
        let dropped = self.ledger.clear().await;

        info!(evicted, dropped, "Delivery manager shut down");
    }

    async fn resolve_channel(&self, recipient: Option<&str>) -> Option<ChannelId> {
        match recipient {
            Some(recipient) => self.registry.resolve(recipient).await,
            None => match self.settings.fallback {
                FallbackPolicy::AnyChannel => self.registry.newest_channel().await,
                FallbackPolicy::Disabled => None,
            },
        }
    }
}

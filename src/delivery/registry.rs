//! Connection registry: live channels, recipient bindings and liveness.
//!
//! All state sits behind one `RwLock`. Transport calls made while the lock is
//! held are non-blocking enqueues, so the lock is never held across I/O.
//!
//! ```text
//! transport connects  ──► register(transport)      -> ChannelId
//! inbound frame       ──► touch(id)
//! outbound frame      ──► send(id, text)           (evicts on failure)
//! transport closes    ──► unregister(id)           (idempotent)
//! periodic            ──► sweep_liveness(now, idle)
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::channel::{ChannelId, ChannelInfo, ChannelTransport};

struct ChannelEntry {
    transport: Arc<dyn ChannelTransport>,
    connected_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl ChannelEntry {
    fn info(&self, id: ChannelId) -> ChannelInfo {
        ChannelInfo {
            id,
            state: self.transport.state(),
            connected_at: self.connected_at,
            last_activity: self.last_activity,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    channels: HashMap<ChannelId, ChannelEntry>,
    bindings: HashMap<String, ChannelId>,
}

impl RegistryState {
    /// Removes a channel, closes its transport and drops bindings to it.
    fn evict(&mut self, id: &ChannelId, reason: &'static str) -> bool {
        let Some(entry) = self.channels.remove(id) else {
            return false;
        };

        entry.transport.close();
        self.bindings.retain(|_, bound| bound != id);
        metrics::counter!("channels_evicted_total", "reason" => reason).increment(1);
        metrics::gauge!("delivery_connected_channels").set(self.channels.len() as f64);
        true
    }
}

/// Outcome of one liveness sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LivenessReport {
    pub inspected: usize,
    pub evicted: usize,
    pub probed: usize,
}

/// Tracks every connected channel and the recipient bindings pointing at them.
///
/// Bindings are evicted together with their channel, so a binding never
/// outlives the channel it names.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a transport under a fresh identity.
    pub async fn register(&self, transport: Arc<dyn ChannelTransport>) -> ChannelId {
        let id = ChannelId::new();
        let now = Utc::now();

        let mut state = self.state.write().await;
        state.channels.insert(
            id,
            ChannelEntry {
                transport,
                connected_at: now,
                last_activity: now,
            },
        );
        metrics::gauge!("delivery_connected_channels").set(state.channels.len() as f64);
        info!(channel_id = %id, connected = state.channels.len(), "Channel registered");

        id
    }

    /// Removes a channel. Safe to call repeatedly or for unknown ids.
    pub async fn unregister(&self, id: &ChannelId) -> bool {
        let removed = self.state.write().await.evict(id, "closed");
        if removed {
            info!(channel_id = %id, "Channel unregistered");
        }
        removed
    }

    pub async fn exists(&self, id: &ChannelId) -> bool {
        self.state.read().await.channels.contains_key(id)
    }

    pub async fn get(&self, id: &ChannelId) -> Option<ChannelInfo> {
        self.state
            .read()
            .await
            .channels
            .get(id)
            .map(|entry| entry.info(*id))
    }

    /// Refreshes the activity timestamp; no-op if the channel is absent.
    pub async fn touch(&self, id: &ChannelId) {
        if let Some(entry) = self.state.write().await.channels.get_mut(id) {
            entry.last_activity = Utc::now();
        }
    }

    /// Sends a text frame to one channel.
    ///
    /// Returns `false` and evicts the channel if its transport is not open or
    /// the send fails. Transport errors never reach the caller.
    pub async fn send(&self, id: &ChannelId, text: &str) -> bool {
        let mut state = self.state.write().await;

        let result = match state.channels.get(id) {
            None => return false,
            Some(entry) => {
                let transport_state = entry.transport.state();
                if transport_state.is_open() {
                    entry.transport.send_text(text.to_owned())
                } else {
                    Err(super::channel::TransportError::NotOpen(transport_state))
                }
            }
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(channel_id = %id, error = %e, "Send failed, evicting channel");
                state.evict(id, "send_failed");
                false
            }
        }
    }

    /// Best-effort send to every channel. Returns the number of successful sends.
    ///
    /// A failing channel is evicted without affecting the others.
    pub async fn broadcast(&self, text: &str) -> usize {
        let mut state = self.state.write().await;

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, entry) in &state.channels {
            let transport_state = entry.transport.state();
            let sent =
                transport_state.is_open() && entry.transport.send_text(text.to_owned()).is_ok();
            if sent {
                delivered += 1;
            } else {
                failed.push(*id);
            }
        }

        for id in &failed {
            warn!(channel_id = %id, "Broadcast send failed, evicting channel");
            state.evict(id, "send_failed");
        }

        delivered
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.channels.len()
    }

    /// Binds `recipient` to a live channel, overwriting any previous binding.
    ///
    /// Returns `false` if the channel is not registered.
    pub async fn bind(&self, recipient: &str, id: &ChannelId) -> bool {
        let mut state = self.state.write().await;
        if !state.channels.contains_key(id) {
            return false;
        }

        if let Some(previous) = state.bindings.insert(recipient.to_owned(), *id)
            && previous != *id
        {
            debug!(recipient, from = %previous, to = %id, "Recipient rebound");
        }
        true
    }

    /// Resolves a recipient to a live channel.
    pub async fn resolve(&self, recipient: &str) -> Option<ChannelId> {
        let state = self.state.read().await;
        state
            .bindings
            .get(recipient)
            .copied()
            .filter(|id| state.channels.contains_key(id))
    }

    /// The most recently connected channel, if any.
    pub async fn newest_channel(&self) -> Option<ChannelId> {
        self.state
            .read()
            .await
            .channels
            .iter()
            .max_by_key(|(_, entry)| entry.connected_at)
            .map(|(id, _)| *id)
    }

    pub async fn binding_count(&self) -> usize {
        self.state.read().await.bindings.len()
    }

    /// Evicts closed channels and probes idle ones.
    ///
    /// A channel whose transport is not open is evicted. A channel inactive
    /// for longer than `idle_threshold` gets a ping; a failed ping evicts it.
    pub async fn sweep_liveness(
        &self,
        now: DateTime<Utc>,
        idle_threshold: Duration,
    ) -> LivenessReport {
        let idle = TimeDelta::from_std(idle_threshold).unwrap_or(TimeDelta::MAX);
        let mut state = self.state.write().await;
        let mut report = LivenessReport {
            inspected: state.channels.len(),
            ..LivenessReport::default()
        };

        let mut dead = Vec::new();
        for (id, entry) in &state.channels {
            if !entry.transport.state().is_open() {
                dead.push((*id, "not_open"));
                continue;
            }

            if now.signed_duration_since(entry.last_activity) > idle {
                match entry.transport.ping() {
                    Ok(()) => report.probed += 1,
                    Err(e) => {
                        debug!(channel_id = %id, error = %e, "Liveness probe failed");
                        dead.push((*id, "probe_failed"));
                    }
                }
            }
        }

        for (id, reason) in dead {
            if state.evict(&id, reason) {
                warn!(channel_id = %id, reason, "Channel evicted by liveness sweep");
                report.evicted += 1;
            }
        }

        report
    }

    /// Force-closes every channel and clears all bindings.
    pub async fn evict_all(&self) -> usize {
        let mut state = self.state.write().await;
        let ids: Vec<ChannelId> = state.channels.keys().copied().collect();
        for id in &ids {
            state.evict(id, "shutdown");
        }
        state.bindings.clear();
        ids.len()
    }
}

//! Channel identity, lifecycle state and the transport seam.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Opaque identity assigned to a channel when it registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChannelId(Uuid);

impl ChannelId {
    /// Generates a fresh random identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Transport lifecycle: `Connecting -> Open -> (Closing) -> Closed`.
///
/// Only [`ChannelState::Open`] accepts sends. There is no reconnecting state:
/// a reconnect is a brand-new channel with a new [`ChannelId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ChannelState {
    pub fn is_open(self) -> bool {
        matches!(self, ChannelState::Open)
    }
}

/// Errors raised by a transport. They never leave the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport is not open (state: {0:?})")]
    NotOpen(ChannelState),

    #[error("transport outbound queue is closed")]
    QueueClosed,
}

/// Low-level handle to one connected peer.
///
/// Implementations must not block: `send_text` and `ping` enqueue and return.
/// `close` must be idempotent; the registry may call it after the transport
/// already closed itself.
#[cfg_attr(test, mockall::automock)]
pub trait ChannelTransport: Send + Sync {
    /// Current lifecycle state.
    fn state(&self) -> ChannelState;

    /// Enqueues a text frame.
    fn send_text(&self, text: String) -> Result<(), TransportError>;

    /// Enqueues a liveness probe.
    fn ping(&self) -> Result<(), TransportError>;

    /// Forces the transport closed.
    fn close(&self);
}

/// Point-in-time view of a registered channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub state: ChannelState,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

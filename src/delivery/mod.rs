//! Asynchronous delivery of shortened URLs over persistent channels.
//!
//! # Components
//!
//! - [`channel`] - Channel identity, lifecycle state and the transport trait
//! - [`protocol`] - JSON wire frames
//! - [`registry`] - Connected channels, recipient bindings, liveness
//! - [`ledger`] - Sent-but-unacknowledged messages and the retry sweep
//! - [`scheduler`] - Retry and liveness timers
//! - [`manager`] - Façade used by the HTTP layer and the transport
//!
//! # Flow
//!
//! ```text
//! POST /api/shorten ─► DeliveryManager::deliver_to ─► registry lookup
//!                                                  └► ledger.dispatch (record + first send)
//! inbound frame     ─► DeliveryManager::on_inbound_frame ─► ledger.acknowledge / registry.touch
//! retry timer       ─► ledger.sweep (resend / expire / drop)
//! liveness timer    ─► registry.sweep_liveness (evict / ping)
//! ```
//!
//! Delivery is at-most-effort: after the configured number of attempts an
//! entry is dropped and only a log line records the failure.

pub mod channel;
pub mod ledger;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod scheduler;

pub use channel::{ChannelId, ChannelInfo, ChannelState, ChannelTransport, TransportError};
pub use ledger::{DeliveryLedger, PendingDelivery, RetryPolicy, SweepReport};
pub use manager::{DeliveryManager, DeliverySettings, DeliveryStats, FallbackPolicy};
pub use protocol::{MessageId, UrlShortenedPayload};
pub use registry::{ConnectionRegistry, LivenessReport};

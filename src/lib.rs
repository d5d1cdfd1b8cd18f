//! # WS Shortener
//!
//! A URL shortener that delivers each short link to its requester over a
//! WebSocket channel, with acknowledgment-based retry.
//!
//! ## Architecture
//!
//! - **Domain Layer** ([`domain`]) - Mapping entity and storage trait
//! - **Application Layer** ([`application`]) - Link creation service
//! - **Delivery** ([`delivery`]) - Connection registry, delivery ledger and retry timers
//! - **Infrastructure Layer** ([`infrastructure`]) - In-memory store and WebSocket transport
//! - **API Layer** ([`api`]) - REST API handlers, DTOs, and middleware
//!
//! ## Flow
//!
//! 1. A client opens `ws://host:3001/ws?recipient=<id>`
//! 2. It posts `{"url": "...", "recipient": "<id>"}` to `/api/shorten`
//! 3. The server stores a fresh code and answers `202 Accepted`
//! 4. A `URL_SHORTENED` frame arrives on the socket; the client replies with
//!    an `ACKNOWLEDGMENT` carrying the same `messageId`
//! 5. Unacknowledged frames are resent until the attempt limit is reached
//!
//! ## Quick Start
//!
//! ```bash
//! export BASE_URL="http://localhost:3000"
//! cargo run
//!
//! # In another terminal
//! cargo run --bin viewer -- --recipient demo
//! ```
//!
//! ## Configuration
//!
//! Service configuration is loaded from environment variables via [`config::Config`].
//! See [`config`] module for available options.

pub mod api;
pub mod application;
pub mod delivery;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod state;
pub mod utils;

pub mod config;
pub mod server;

pub mod routes;

pub use error::AppError;
pub use state::AppState;

/// Commonly used types for external consumers.
///
/// Re-exports frequently used types to simplify imports for library users
/// and integration tests.
pub mod prelude {
    pub use crate::application::services::LinkService;
    pub use crate::delivery::{
        ChannelId, ChannelState, ChannelTransport, DeliveryManager, DeliverySettings,
        FallbackPolicy, RetryPolicy, TransportError, UrlShortenedPayload,
    };
    pub use crate::domain::entities::UrlMapping;
    pub use crate::error::AppError;
    pub use crate::infrastructure::persistence::InMemoryMappingStore;
    pub use crate::state::AppState;
}

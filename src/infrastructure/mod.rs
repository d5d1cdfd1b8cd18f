//! Infrastructure layer for external integrations.
//!
//! # Modules
//!
//! - [`persistence`] - Mapping store implementations
//! - [`websocket`] - WebSocket channel transport

pub mod persistence;
pub mod websocket;

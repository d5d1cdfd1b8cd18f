//! WebSocket channel transport.
//!
//! - [`WsTransport`] - non-blocking outbound handle registered with the delivery registry
//! - [`ws_handler`] - upgrade endpoint; one task per connection

mod handler;
mod transport;

pub use handler::{ConnectParams, serve_socket, ws_handler};
pub use transport::WsTransport;

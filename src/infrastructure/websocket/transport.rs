//! [`ChannelTransport`] over an axum WebSocket.

use std::sync::atomic::{AtomicU8, Ordering};

use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio::sync::{Notify, mpsc};

use crate::delivery::{ChannelState, ChannelTransport, TransportError};

const CONNECTING: u8 = 0;
const OPEN: u8 = 1;
const CLOSING: u8 = 2;
const CLOSED: u8 = 3;

/// Outbound half of one WebSocket connection.
///
/// Frames are pushed onto an unbounded queue drained by the connection's
/// writer task, so sends never wait on the socket. The connection task
/// listens on [`WsTransport::closed`] to tear the socket down on forced close.
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<Message>,
    state: AtomicU8,
    close_signal: Notify,
}

impl WsTransport {
    /// Creates a transport in the `Connecting` state.
    pub fn new(outbound: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            outbound,
            state: AtomicU8::new(CONNECTING),
            close_signal: Notify::new(),
        }
    }

    /// `Connecting -> Open`. Returns `false` if the transport already moved on.
    pub fn mark_open(&self) -> bool {
        self.state
            .compare_exchange(CONNECTING, OPEN, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Marks the socket as gone, e.g. after the writer failed.
    pub fn mark_closed(&self) {
        if self.state.swap(CLOSED, Ordering::SeqCst) != CLOSED {
            self.close_signal.notify_one();
        }
    }

    /// Resolves when the transport has been closed from the server side.
    pub async fn closed(&self) {
        self.close_signal.notified().await;
    }

    fn enqueue(&self, message: Message) -> Result<(), TransportError> {
        let state = self.state();
        if !state.is_open() {
            return Err(TransportError::NotOpen(state));
        }
        self.outbound
            .send(message)
            .map_err(|_| TransportError::QueueClosed)
    }
}

impl ChannelTransport for WsTransport {
    fn state(&self) -> ChannelState {
        match self.state.load(Ordering::SeqCst) {
            CONNECTING => ChannelState::Connecting,
            OPEN => ChannelState::Open,
            CLOSING => ChannelState::Closing,
            _ => ChannelState::Closed,
        }
    }

    fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.enqueue(Message::Text(text.into()))
    }

    fn ping(&self) -> Result<(), TransportError> {
        self.enqueue(Message::Ping(Bytes::new()))
    }

    fn close(&self) {
        let previous = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |state| {
                (state < CLOSING).then_some(CLOSING)
            });

        if previous.is_ok() {
            let _ = self.outbound.send(Message::Close(None));
            self.close_signal.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> (WsTransport, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (WsTransport::new(tx), rx)
    }

    #[test]
    fn test_starts_connecting_and_refuses_sends() {
        let (transport, _rx) = transport();
        assert_eq!(transport.state(), ChannelState::Connecting);
        assert_eq!(
            transport.send_text("x".to_string()),
            Err(TransportError::NotOpen(ChannelState::Connecting))
        );
    }

    #[test]
    fn test_open_transport_enqueues_frames() {
        let (transport, mut rx) = transport();
        assert!(transport.mark_open());
        assert!(!transport.mark_open());

        transport.send_text("hello".to_string()).unwrap();
        transport.ping().unwrap();

        assert!(matches!(rx.try_recv().unwrap(), Message::Text(t) if t.as_str() == "hello"));
        assert!(matches!(rx.try_recv().unwrap(), Message::Ping(_)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let (transport, mut rx) = transport();
        transport.mark_open();

        transport.close();
        transport.close();

        assert_eq!(transport.state(), ChannelState::Closing);
        assert!(matches!(rx.try_recv().unwrap(), Message::Close(None)));
        assert!(rx.try_recv().is_err());
        assert!(transport.send_text("late".to_string()).is_err());
    }

    #[test]
    fn test_dropped_receiver_fails_send() {
        let (transport, rx) = transport();
        transport.mark_open();
        drop(rx);

        assert_eq!(
            transport.send_text("x".to_string()),
            Err(TransportError::QueueClosed)
        );
    }

    #[tokio::test]
    async fn test_closed_resolves_after_close() {
        let (transport, _rx) = transport();
        transport.mark_open();
        transport.close();

        transport.closed().await;
    }

    #[test]
    fn test_mark_closed_after_close() {
        let (transport, _rx) = transport();
        transport.mark_open();
        transport.close();
        transport.mark_closed();

        assert_eq!(transport.state(), ChannelState::Closed);
    }
}

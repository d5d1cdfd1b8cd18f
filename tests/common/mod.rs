#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ws_shortener::application::services::LinkService;
use ws_shortener::delivery::protocol::{ServerFrame, decode_server_frame};
use ws_shortener::delivery::{
    ChannelState, ChannelTransport, DeliveryManager, DeliverySettings, TransportError,
};
use ws_shortener::infrastructure::persistence::InMemoryMappingStore;
use ws_shortener::state::AppState;
use ws_shortener::utils::code_generator::CodeGenerator;

pub const BASE_URL: &str = "http://short.test";

pub fn create_test_state(settings: DeliverySettings) -> AppState {
    let store = Arc::new(InMemoryMappingStore::new());
    let link_service = Arc::new(LinkService::new(store, CodeGenerator::default(), BASE_URL));
    let delivery = Arc::new(DeliveryManager::new(settings));
    AppState::new(link_service, delivery)
}

/// In-memory transport that records every frame sent through it.
#[derive(Default)]
pub struct FakeTransport {
    frames: Mutex<Vec<String>>,
    closed: AtomicBool,
    fail_sends: AtomicBool,
    fail_pings: AtomicBool,
    pings: AtomicUsize,
    close_calls: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    /// Decoded `URL_SHORTENED` frames in send order.
    pub fn deliveries(&self) -> Vec<(uuid::Uuid, String)> {
        self.frames()
            .iter()
            .map(|raw| match decode_server_frame(raw).unwrap() {
                ServerFrame::UrlShortened { message_id, data } => {
                    (message_id, data.shortened_url)
                }
            })
            .collect()
    }

    /// Simulates the peer going away without the server noticing yet.
    pub fn drop_connection(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub fn fail_pings(&self) {
        self.fail_pings.store(true, Ordering::SeqCst);
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl ChannelTransport for FakeTransport {
    fn state(&self) -> ChannelState {
        if self.closed.load(Ordering::SeqCst) {
            ChannelState::Closed
        } else {
            ChannelState::Open
        }
    }

    fn send_text(&self, text: String) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::NotOpen(ChannelState::Closed));
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::QueueClosed);
        }
        self.frames.lock().unwrap().push(text);
        Ok(())
    }

    fn ping(&self) -> Result<(), TransportError> {
        if self.fail_pings.load(Ordering::SeqCst) {
            return Err(TransportError::QueueClosed);
        }
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}

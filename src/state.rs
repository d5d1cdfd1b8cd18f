//! Shared state injected into HTTP handlers.

use std::sync::Arc;

use crate::application::services::LinkService;
use crate::delivery::DeliveryManager;
use crate::infrastructure::persistence::InMemoryMappingStore;

#[derive(Clone)]
pub struct AppState {
    pub link_service: Arc<LinkService<InMemoryMappingStore>>,
    pub delivery: Arc<DeliveryManager>,
}

impl AppState {
    pub fn new(
        link_service: Arc<LinkService<InMemoryMappingStore>>,
        delivery: Arc<DeliveryManager>,
    ) -> Self {
        Self {
            link_service,
            delivery,
        }
    }
}

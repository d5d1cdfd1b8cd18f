//! Top-level router configuration for both listeners.
//!
//! # Route Structure
//!
//! HTTP listener:
//!
//! - `GET  /{code}`       - Short link redirect
//! - `GET  /health`       - Health check with delivery statistics
//! - `POST /api/shorten`  - Create a short link and deliver it
//!
//! WebSocket listener:
//!
//! - `GET  /ws?recipient=<id>` - Delivery channel upgrade
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Path normalization** - Trailing slash handling

use std::sync::Arc;

use crate::api;
use crate::api::handlers::{health_handler, redirect_handler};
use crate::api::middleware::tracing;
use crate::delivery::DeliveryManager;
use crate::infrastructure::websocket::ws_handler;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Constructs the HTTP router with all routes and middleware.
pub fn app_router(state: AppState) -> NormalizePath<Router> {
    let router = Router::new()
        .route("/{code}", get(redirect_handler))
        .route("/health", get(health_handler))
        .nest("/api", api::routes::api_routes())
        .with_state(state)
        .layer(tracing::layer());

    NormalizePathLayer::trim_trailing_slash().layer(router)
}

/// Constructs the router served on the WebSocket listener.
pub fn ws_router(delivery: Arc<DeliveryManager>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(delivery)
        .layer(tracing::layer())
}

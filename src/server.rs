//! Server initialization and runtime setup.
//!
//! Builds the mapping store and the delivery subsystem, then serves the HTTP
//! and WebSocket listeners until a shutdown signal arrives.

use crate::application::services::LinkService;
use crate::config::Config;
use crate::delivery::DeliveryManager;
use crate::infrastructure::persistence::InMemoryMappingStore;
use crate::routes::{app_router, ws_router};
use crate::state::AppState;
use crate::utils::code_generator::CodeGenerator;

use anyhow::Result;
use axum::ServiceExt;
use axum::extract::Request;
use std::net::SocketAddr;
use std::sync::Arc;

/// Runs both listeners with the given configuration.
///
/// Initializes:
/// - In-memory mapping store (bounded when `STORE_CAPACITY` is set)
/// - Delivery manager with its retry and liveness timers
/// - HTTP server on `LISTEN`
/// - WebSocket server on `WS_LISTEN`
///
/// On Ctrl+C the HTTP server drains, the delivery manager shuts down and
/// the WebSocket server stops with it.
///
/// # Errors
///
/// Returns an error if:
/// - A listen address cannot be parsed or bound
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let store = Arc::new(match config.store_capacity {
        Some(capacity) => InMemoryMappingStore::with_capacity_limit(capacity),
        None => InMemoryMappingStore::new(),
    });

    let link_service = Arc::new(LinkService::new(
        store,
        CodeGenerator::new(config.code_max_attempts),
        config.base_url.clone(),
    ));

    let delivery = Arc::new(DeliveryManager::new(config.delivery_settings()));
    delivery.start().await;

    let state = AppState::new(link_service, delivery.clone());

    let http_addr: SocketAddr = config.listen_addr.parse()?;
    let ws_addr: SocketAddr = config.ws_listen_addr.parse()?;

    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    let ws_listener = tokio::net::TcpListener::bind(ws_addr).await?;
    tracing::info!("Listening on http://{http_addr}");
    tracing::info!("WebSocket channel on ws://{ws_addr}/ws");

    let ws_app = ws_router(delivery.clone());
    let ws_stopped = delivery.stopped();
    let ws_server = tokio::spawn(async move {
        axum::serve(ws_listener, ws_app)
            .with_graceful_shutdown(ws_stopped)
            .await
    });

    let http_result = axum::serve(
        http_listener,
        ServiceExt::<Request>::into_make_service(app_router(state)),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    delivery.shutdown().await;

    match ws_server.await {
        Ok(Err(e)) => tracing::error!("WebSocket server error: {e}"),
        Err(e) => tracing::error!("WebSocket server task failed: {e}"),
        Ok(Ok(())) => {}
    }

    http_result?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        return;
    }
    tracing::info!("Shutdown signal received");
}

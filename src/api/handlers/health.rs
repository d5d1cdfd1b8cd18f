//! Handler for the health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::HealthResponse;
use crate::state::AppState;

/// Returns service health and a delivery snapshot.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: Delivery subsystem running
/// - **503 Service Unavailable**: Delivery subsystem shut down
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "delivery": {
///     "connected_channels": 2,
///     "pending_deliveries": 1,
///     "active_bindings": 1
///   }
/// }
/// ```
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let running = !state.delivery.is_stopped();

    let response = HealthResponse {
        status: if running { "healthy" } else { "stopped" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        delivery: state.delivery.stats().await,
    };

    if running {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

//! DTOs for the health check endpoint.

use serde::Serialize;

use crate::delivery::DeliveryStats;

/// Health check response with delivery statistics.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub delivery: DeliveryStats,
}

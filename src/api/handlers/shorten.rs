//! Handler for the link shortening endpoint.

use axum::{Json, extract::State, http::StatusCode};
use validator::Validate;

use crate::api::dto::shorten::{ShortenAccepted, ShortenRequest};
use crate::delivery::UrlShortenedPayload;
use crate::error::AppError;
use crate::state::AppState;

/// Creates a short link and delivers it asynchronously.
///
/// # Endpoint
///
/// `POST /api/shorten`
///
/// # Request Body
///
/// ```json
/// { "url": "https://example.com", "recipient": "session-42" }
/// ```
///
/// # Response
///
/// `202 Accepted` once the code is stored and the first delivery attempt has
/// been dispatched, whether or not any channel received it:
///
/// ```json
/// { "status": "accepted", "delivered": true }
/// ```
///
/// The short URL arrives on the recipient's WebSocket as a `URL_SHORTENED`
/// frame.
///
/// # Errors
///
/// - 400 `validation_error` for invalid input
/// - 503 `generation_exhausted` when no unused code could be found
/// - 500 `storage_error` when the mapping store fails
pub async fn shorten_handler(
    State(state): State<AppState>,
    Json(payload): Json<ShortenRequest>,
) -> Result<(StatusCode, Json<ShortenAccepted>), AppError> {
    payload.validate()?;

    let mapping = state.link_service.create_short_link(payload.url).await?;

    let delivered = state
        .delivery
        .deliver_to(
            payload.recipient.as_deref(),
            UrlShortenedPayload::new(mapping.short_url),
        )
        .await;

    Ok((
        StatusCode::ACCEPTED,
        Json(ShortenAccepted {
            status: "accepted",
            delivered,
        }),
    ))
}

//! DTOs for the link shortening endpoint.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to shorten one URL.
#[derive(Debug, Deserialize, Validate)]
pub struct ShortenRequest {
    /// The original URL to shorten (must be a valid absolute URL).
    #[validate(
        url(message = "Invalid URL format"),
        length(max = 2048, message = "URL is too long")
    )]
    pub url: String,

    /// Recipient the short URL should be delivered to. When absent the
    /// server's fallback policy picks a channel.
    #[validate(length(min = 1, max = 128))]
    pub recipient: Option<String>,
}

/// Accepted response. The short URL itself travels over the WebSocket.
#[derive(Debug, Serialize)]
pub struct ShortenAccepted {
    pub status: &'static str,
    /// Whether the first delivery attempt reached a connected channel.
    pub delivered: bool,
}

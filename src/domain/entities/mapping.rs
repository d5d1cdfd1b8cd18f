//! Url mapping entity: a short code bound to its original URL.

use chrono::{DateTime, Utc};

/// A stored mapping from a short code to the original URL.
///
/// `short_url` is derived from the configured base URL at creation time and
/// kept alongside the code so redirects and deliveries never recompose it.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlMapping {
    pub code: String,
    pub original_url: String,
    pub short_url: String,
    pub created_at: DateTime<Utc>,
}

impl UrlMapping {
    /// Creates a new mapping stamped with the current time.
    pub fn new(code: String, original_url: String, short_url: String) -> Self {
        Self {
            code,
            original_url,
            short_url,
            created_at: Utc::now(),
        }
    }
}

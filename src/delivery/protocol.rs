//! JSON wire frames exchanged over a channel.
//!
//! ```text
//! server -> client  {"type":"URL_SHORTENED","messageId":"<uuid>","data":{"shortenedURL":"..."}}
//! client -> server  {"type":"ACKNOWLEDGMENT","messageId":"<uuid>"}
//! client -> server  {"type":"HEARTBEAT"}
//! ```
//!
//! Decoding inbound frames is lenient: anything that parses as a JSON object
//! but is not a known frame comes back as [`InboundFrame::Unrecognized`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Globally unique identity of one delivered message.
pub type MessageId = Uuid;

/// Payload of a `URL_SHORTENED` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlShortenedPayload {
    #[serde(rename = "shortenedURL")]
    pub shortened_url: String,
}

impl UrlShortenedPayload {
    pub fn new(shortened_url: impl Into<String>) -> Self {
        Self {
            shortened_url: shortened_url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerFrame {
    UrlShortened {
        #[serde(rename = "messageId")]
        message_id: MessageId,
        data: UrlShortenedPayload,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientFrame {
    Acknowledgment {
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },
    Heartbeat,
}

/// Result of decoding a text frame that was at least a JSON object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Known(ClientFrame),
    /// Valid JSON object with an unknown `type` or missing/invalid fields.
    Unrecognized { kind: Option<String> },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,
}

/// Encodes the frame carrying a shortened URL.
pub fn encode_url_shortened(
    message_id: MessageId,
    payload: &UrlShortenedPayload,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ServerFrame::UrlShortened {
        message_id,
        data: payload.clone(),
    })
}

/// Encodes a client frame (used by the viewer client).
pub fn encode_client_frame(frame: &ClientFrame) -> Result<String, serde_json::Error> {
    serde_json::to_string(frame)
}

/// Decodes a server frame (used by the viewer client).
pub fn decode_server_frame(raw: &str) -> Result<ServerFrame, ProtocolError> {
    Ok(serde_json::from_str(raw)?)
}

/// Decodes an inbound text frame.
///
/// # Errors
///
/// Returns [`ProtocolError`] only when the input is not a JSON object at all.
pub fn decode_client_frame(raw: &str) -> Result<InboundFrame, ProtocolError> {
    let value: Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Err(ProtocolError::NotAnObject);
    }

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_owned);

    match serde_json::from_value::<ClientFrame>(value) {
        Ok(frame) => Ok(InboundFrame::Known(frame)),
        Err(_) => Ok(InboundFrame::Unrecognized { kind }),
    }
}

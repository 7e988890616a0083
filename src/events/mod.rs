//! Inbound webhook events.
//!
//! Wire shapes are validated once here and converted into [`InboundEvent`]; nothing
//! downstream looks at raw JSON again.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::LinehookError;

/// Opaque, single-use token addressing the reply to one event.
///
/// Deliberately not `Clone`: a token is moved into at most one reply.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ReplyToken(String);

impl ReplyToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    User {
        user_id: String,
    },
    Group {
        group_id: String,
        user_id: Option<String>,
    },
    Room {
        room_id: String,
        user_id: Option<String>,
    },
    Unknown,
}

impl EventSource {
    /// Group chats and multi-person rooms.
    pub fn is_multi_party(&self) -> bool {
        matches!(self, Self::Group { .. } | Self::Room { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageContent {
    /// Stored by the platform, fetched through the content API.
    Line,
    External {
        original_url: Option<String>,
        preview_url: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    TextMessage {
        message_id: String,
        text: String,
    },
    StickerMessage {
        message_id: String,
        package_id: String,
        sticker_id: String,
    },
    ImageMessage {
        message_id: String,
        content: ImageContent,
    },
    Join,
    /// Any event or message type we do not act on (`follow`, `postback`, `message/video`, ...).
    Other {
        event_type: String,
    },
}

impl EventKind {
    /// Short label for logs.
    pub fn label(&self) -> &str {
        match self {
            Self::TextMessage { .. } => "message/text",
            Self::StickerMessage { .. } => "message/sticker",
            Self::ImageMessage { .. } => "message/image",
            Self::Join => "join",
            Self::Other { event_type } => event_type,
        }
    }

    fn message_id(&self) -> Option<&str> {
        match self {
            Self::TextMessage { message_id, .. }
            | Self::StickerMessage { message_id, .. }
            | Self::ImageMessage { message_id, .. } => Some(message_id),
            Self::Join | Self::Other { .. } => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct InboundEvent {
    pub webhook_event_id: Option<String>,
    pub source: EventSource,
    pub reply_token: Option<ReplyToken>,
    pub timestamp: DateTime<Utc>,
    pub is_redelivery: bool,
    pub kind: EventKind,
}

impl InboundEvent {
    /// Key used to recognise an event the platform delivered more than once.
    /// Prefers the webhook event id; falls back to the message id.
    pub fn dedup_key(&self) -> Option<String> {
        if let Some(id) = &self.webhook_event_id {
            return Some(format!("evt_{}", id));
        }
        self.kind.message_id().map(|id| format!("msg_{}", id))
    }
}

/// One decoded delivery. Events keep the order they had in the payload; each one
/// decodes independently so a bad event cannot sink its siblings.
#[derive(Debug)]
pub struct EventBatch {
    pub destination: Option<String>,
    pub events: Vec<Result<InboundEvent, LinehookError>>,
}

impl EventBatch {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// --- wire format ---

#[derive(Deserialize)]
struct RawPayload {
    #[serde(default)]
    destination: Option<String>,
    events: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    timestamp: i64,
    #[serde(default)]
    source: Option<Value>,
    #[serde(default)]
    reply_token: Option<String>,
    #[serde(default)]
    webhook_event_id: Option<String>,
    #[serde(default)]
    delivery_context: Option<RawDeliveryContext>,
    #[serde(default)]
    message: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDeliveryContext {
    #[serde(default)]
    is_redelivery: bool,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawSource {
    #[serde(rename_all = "camelCase")]
    User { user_id: String },
    #[serde(rename_all = "camelCase")]
    Group {
        group_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Room {
        room_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
}

#[derive(Deserialize)]
struct RawTextMessage {
    id: String,
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStickerMessage {
    id: String,
    package_id: String,
    sticker_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawImageMessage {
    id: String,
    #[serde(default)]
    content_provider: Option<RawContentProvider>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContentProvider {
    #[serde(rename = "type")]
    provider_type: String,
    #[serde(default)]
    original_content_url: Option<String>,
    #[serde(default)]
    preview_image_url: Option<String>,
}

/// Decode a verified delivery body.
///
/// Fails with `MalformedPayload` only when the top level is not an
/// `{"events": [...]}` document. Per-event problems surface as
/// `Err(MalformedEvent)` entries inside the batch.
pub fn decode_events(body: &[u8]) -> Result<EventBatch, LinehookError> {
    let payload: RawPayload = serde_json::from_slice(body)
        .map_err(|e| LinehookError::MalformedPayload(e.to_string()))?;

    let events = payload
        .events
        .into_iter()
        .enumerate()
        .map(|(index, value)| decode_event(index, value))
        .collect();

    Ok(EventBatch {
        destination: payload.destination,
        events,
    })
}

fn decode_event(index: usize, value: Value) -> Result<InboundEvent, LinehookError> {
    let malformed = |reason: String| LinehookError::MalformedEvent { index, reason };

    let raw: RawEvent = serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(raw.timestamp)
        .ok_or_else(|| malformed(format!("timestamp out of range: {}", raw.timestamp)))?;

    let kind = match raw.event_type.as_str() {
        "message" => decode_message(raw.message).map_err(malformed)?,
        "join" => EventKind::Join,
        other => EventKind::Other {
            event_type: other.to_string(),
        },
    };

    Ok(InboundEvent {
        webhook_event_id: raw.webhook_event_id,
        source: raw.source.map_or(EventSource::Unknown, decode_source),
        reply_token: raw.reply_token.map(ReplyToken),
        timestamp,
        is_redelivery: raw.delivery_context.is_some_and(|c| c.is_redelivery),
        kind,
    })
}

fn decode_source(value: Value) -> EventSource {
    match serde_json::from_value::<RawSource>(value) {
        Ok(RawSource::User { user_id }) => EventSource::User { user_id },
        Ok(RawSource::Group { group_id, user_id }) => EventSource::Group { group_id, user_id },
        Ok(RawSource::Room { room_id, user_id }) => EventSource::Room { room_id, user_id },
        Err(e) => {
            debug!("events: unrecognised source: {}", e);
            EventSource::Unknown
        }
    }
}

fn decode_message(message: Option<Value>) -> Result<EventKind, String> {
    let message = message.ok_or_else(|| "message event without message object".to_string())?;
    let message_type = message
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| "message without type".to_string())?
        .to_string();

    let kind = match message_type.as_str() {
        "text" => {
            let m: RawTextMessage =
                serde_json::from_value(message).map_err(|e| format!("text message: {}", e))?;
            EventKind::TextMessage {
                message_id: m.id,
                text: m.text,
            }
        }
        "sticker" => {
            let m: RawStickerMessage =
                serde_json::from_value(message).map_err(|e| format!("sticker message: {}", e))?;
            EventKind::StickerMessage {
                message_id: m.id,
                package_id: m.package_id,
                sticker_id: m.sticker_id,
            }
        }
        "image" => {
            let m: RawImageMessage =
                serde_json::from_value(message).map_err(|e| format!("image message: {}", e))?;
            let content = match m.content_provider {
                Some(p) if p.provider_type == "external" => ImageContent::External {
                    original_url: p.original_content_url,
                    preview_url: p.preview_image_url,
                },
                _ => ImageContent::Line,
            };
            EventKind::ImageMessage {
                message_id: m.id,
                content,
            }
        }
        other => EventKind::Other {
            event_type: format!("message/{}", other),
        },
    };
    Ok(kind)
}

#[cfg(test)]
mod tests;

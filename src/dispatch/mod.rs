//! Per-event routing: event kind first, then the command inside text messages.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::commands::Command;
use crate::config::{DispatchConfig, StickerReplyMode, UnrecognizedTextMode};
use crate::errors::LinehookError;
use crate::events::{EventKind, EventSource, InboundEvent, ReplyToken};

/// Platform limit on messages in one reply call.
pub const MAX_MESSAGES_PER_REPLY: usize = 5;
/// Platform limit on characters in one text message.
pub const MAX_TEXT_CHARS: usize = 5000;

/// A message in LINE wire shape (`{"type":"text","text":...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Sticker {
        package_id: String,
        sticker_id: String,
    },
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// One reply call: the token it consumes and up to five messages.
#[derive(Debug)]
pub struct ReplyAction {
    pub reply_token: ReplyToken,
    pub messages: Vec<OutboundMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    /// Join and other event types we only log.
    NotHandled,
    /// `!echo` with nothing to echo.
    EmptyEcho,
    /// Plain text while `unrecognizedText` is `ignore`.
    IgnoredText,
    /// Plain group text that did not mention the bot.
    NotMentioned,
}

#[derive(Debug)]
pub enum DispatchResult {
    Reply(ReplyAction),
    NoOp(NoOpReason),
}

pub struct Dispatcher {
    config: DispatchConfig,
    mention: Option<String>,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        let mention = config.group_mention.as_ref().map(|m| format!("@{}", m));
        Self { config, mention }
    }

    /// Route one event. Consumes it so the reply token moves into the action.
    pub fn dispatch(&self, event: InboundEvent) -> Result<DispatchResult, LinehookError> {
        let InboundEvent {
            reply_token,
            source,
            kind,
            ..
        } = event;

        let messages = match &kind {
            EventKind::TextMessage { text, .. } => match self.route_text(&source, text) {
                Ok(messages) => messages,
                Err(reason) => return Ok(DispatchResult::NoOp(reason)),
            },
            EventKind::StickerMessage {
                package_id,
                sticker_id,
                ..
            } => vec![self.sticker_reply(package_id, sticker_id)],
            EventKind::ImageMessage { .. } => {
                vec![OutboundMessage::text(self.config.image_ack_text.clone())]
            }
            EventKind::Join | EventKind::Other { .. } => {
                info!("dispatch: no handler for {} event", kind.label());
                return Ok(DispatchResult::NoOp(NoOpReason::NotHandled));
            }
        };

        let Some(reply_token) = reply_token else {
            return Err(LinehookError::Handler {
                event: kind.label().to_string(),
                message: "event carries no reply token".into(),
            });
        };

        Ok(DispatchResult::Reply(ReplyAction {
            reply_token,
            messages,
        }))
    }

    fn route_text(
        &self,
        source: &EventSource,
        text: &str,
    ) -> Result<Vec<OutboundMessage>, NoOpReason> {
        match Command::parse(text) {
            Command::Help => Ok(vec![OutboundMessage::text(self.config.help_text.clone())]),
            Command::Echo(body) => {
                if body.is_empty() {
                    debug!("dispatch: empty !echo, nothing to send");
                    return Err(NoOpReason::EmptyEcho);
                }
                Ok(chunk_text(&body))
            }
            Command::None => {
                if source.is_multi_party()
                    && let Some(mention) = &self.mention
                    && !text.contains(mention.as_str())
                {
                    return Err(NoOpReason::NotMentioned);
                }
                match self.config.unrecognized_text {
                    UnrecognizedTextMode::Mirror => Ok(chunk_text(text)),
                    UnrecognizedTextMode::Ignore => Err(NoOpReason::IgnoredText),
                }
            }
        }
    }

    fn sticker_reply(&self, package_id: &str, sticker_id: &str) -> OutboundMessage {
        match self.config.sticker_reply {
            StickerReplyMode::Echo => OutboundMessage::Sticker {
                package_id: package_id.to_string(),
                sticker_id: sticker_id.to_string(),
            },
            StickerReplyMode::Acknowledge => {
                OutboundMessage::text(self.config.sticker_ack_text.clone())
            }
        }
    }
}

/// Split text into messages of at most [`MAX_TEXT_CHARS`] characters, never
/// trimming, keeping at most [`MAX_MESSAGES_PER_REPLY`] of them.
pub fn chunk_text(text: &str) -> Vec<OutboundMessage> {
    let mut messages = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if messages.len() == MAX_MESSAGES_PER_REPLY {
            warn!(
                "dispatch: reply text exceeds {} messages, dropping {} trailing chars",
                MAX_MESSAGES_PER_REPLY,
                rest.chars().count()
            );
            break;
        }
        let split = rest
            .char_indices()
            .nth(MAX_TEXT_CHARS)
            .map_or(rest.len(), |(i, _)| i);
        let (head, tail) = rest.split_at(split);
        messages.push(OutboundMessage::text(head));
        rest = tail;
    }
    messages
}

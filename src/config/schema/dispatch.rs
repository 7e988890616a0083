use serde::{Deserialize, Serialize};

use super::default_true;

/// What to do with text that is not a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnrecognizedTextMode {
    /// Reply with the original text.
    #[default]
    Mirror,
    Ignore,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StickerReplyMode {
    /// Send the same sticker back.
    #[default]
    Echo,
    /// Reply with `stickerAckText`.
    Acknowledge,
}

fn default_help_text() -> String {
    "Available commands:\n!help - show this message\n!echo <text> - repeat <text> back".to_string()
}

fn default_sticker_ack_text() -> String {
    "Nice sticker!".to_string()
}

fn default_image_ack_text() -> String {
    "Got your image.".to_string()
}

fn default_dedup_capacity() -> usize {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default, rename = "unrecognizedText")]
    pub unrecognized_text: UnrecognizedTextMode,
    #[serde(default, rename = "stickerReply")]
    pub sticker_reply: StickerReplyMode,
    #[serde(default = "default_help_text", rename = "helpText")]
    pub help_text: String,
    #[serde(default = "default_sticker_ack_text", rename = "stickerAckText")]
    pub sticker_ack_text: String,
    #[serde(default = "default_image_ack_text", rename = "imageAckText")]
    pub image_ack_text: String,
    /// When set, plain text in groups and rooms is only handled if it contains `@<name>`.
    #[serde(default, rename = "groupMention")]
    pub group_mention: Option<String>,
    #[serde(default = "default_dedup_capacity", rename = "dedupCapacity")]
    pub dedup_capacity: usize,
    #[serde(default = "default_true", rename = "concurrentEvents")]
    pub concurrent_events: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            unrecognized_text: UnrecognizedTextMode::default(),
            sticker_reply: StickerReplyMode::default(),
            help_text: default_help_text(),
            sticker_ack_text: default_sticker_ack_text(),
            image_ack_text: default_image_ack_text(),
            group_mention: None,
            dedup_capacity: default_dedup_capacity(),
            concurrent_events: true,
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_consumed_token_capacity() -> usize {
    4096
}

/// Outbound retry policy shared by replies and pushes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyConfig {
    #[serde(default = "default_max_retries", rename = "maxRetries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms", rename = "initialDelayMs")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms", rename = "maxDelayMs")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier", rename = "backoffMultiplier")]
    pub backoff_multiplier: f64,
    #[serde(
        default = "default_consumed_token_capacity",
        rename = "consumedTokenCapacity"
    )]
    pub consumed_token_capacity: usize,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            consumed_token_capacity: default_consumed_token_capacity(),
        }
    }
}

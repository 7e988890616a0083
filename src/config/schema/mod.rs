use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::LinehookError;
use crate::gateway::{HEALTH_PATH, PUSH_PATH};

/// Upper bound for a single retry wait.
pub const MAX_REPLY_DELAY_MS: u64 = 300_000;

/// Generates a `Debug` impl that redacts secret fields.
///
/// Field specifiers:
/// - `field_name`: printed normally via `&self.field_name`
/// - `redact(field_name)`: a `String` shown as `[empty]` or `[REDACTED]`
macro_rules! redact_debug {
    (@field $builder:ident, $self:ident, redact($field:ident)) => {
        $builder.field(
            stringify!($field),
            &if $self.$field.is_empty() {
                "[empty]"
            } else {
                "[REDACTED]"
            },
        );
    };
    (@field $builder:ident, $self:ident, $field:ident) => {
        $builder.field(stringify!($field), &$self.$field);
    };

    (@fields $builder:ident, $self:ident,) => {};
    (@fields $builder:ident, $self:ident, redact($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, $field:ident, $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, $field);
        redact_debug!(@fields $builder, $self, $($rest)*);
    };

    ($struct_name:ident, $($fields:tt)*) => {
        impl std::fmt::Debug for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut builder = f.debug_struct(stringify!($struct_name));
                redact_debug!(@fields builder, self, $($fields)*);
                builder.finish()
            }
        }
    };
}

// Declared after the macro so they can use `redact_debug!`
mod dispatch;
mod line;

pub use dispatch::*;
pub use line::*;

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_webhook_path() -> String {
    "/line/webhook".to_string()
}

fn default_max_body_bytes() -> usize {
    1_048_576
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_webhook_path", rename = "webhookPath")]
    pub webhook_path: String,
    /// Deliveries larger than this are rejected with 413.
    #[serde(default = "default_max_body_bytes", rename = "maxBodyBytes")]
    pub max_body_bytes: usize,
    /// Bearer token guarding `POST /line/push`. Empty disables the endpoint.
    #[serde(default, rename = "pushToken")]
    pub push_token: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_path: default_webhook_path(),
            max_body_bytes: default_max_body_bytes(),
            push_token: String::new(),
        }
    }
}

redact_debug!(
    GatewayConfig,
    host,
    port,
    webhook_path,
    max_body_bytes,
    redact(push_token),
);

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub line: LineConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub reply: ReplyConfig,
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), LinehookError> {
        self.validate_line()?;
        self.validate_gateway()?;
        self.validate_dispatch()?;
        self.validate_reply()?;
        Ok(())
    }

    /// Stricter check for serving traffic: both channel credentials must be present.
    pub fn validate_for_serving(&self) -> Result<(), LinehookError> {
        self.validate()?;
        if self.line.channel_secret.is_empty() {
            return Err(LinehookError::Config(
                "line.channelSecret is required to verify webhook deliveries".into(),
            ));
        }
        if self.line.channel_access_token.is_empty() {
            return Err(LinehookError::Config(
                "line.channelAccessToken is required to send replies".into(),
            ));
        }
        Ok(())
    }

    fn validate_line(&self) -> Result<(), LinehookError> {
        match url::Url::parse(&self.line.api_base) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {
                if u.scheme() == "http" {
                    warn!(
                        "line.apiBase uses plain http ({}), access token will be sent unencrypted",
                        self.line.api_base
                    );
                }
            }
            _ => {
                return Err(LinehookError::Config(format!(
                    "line.apiBase is not a valid http(s) URL: {}",
                    self.line.api_base
                )));
            }
        }
        let groups = &self.line.allowed_group_ids;
        if groups.iter().any(|g| g.trim().is_empty()) {
            return Err(LinehookError::Config(
                "line.allowedGroupIds must not contain empty entries".into(),
            ));
        }
        Ok(())
    }

    fn validate_gateway(&self) -> Result<(), LinehookError> {
        let g = &self.gateway;

        if g.port == 0 {
            return Err(LinehookError::Config("gateway.port must be > 0".into()));
        }
        if g.port < 1024 {
            warn!(
                "gateway.port {} is a privileged port (< 1024), may require elevated permissions",
                g.port
            );
        }
        if !g.webhook_path.starts_with('/') || g.webhook_path.len() < 2 {
            return Err(LinehookError::Config(
                "gateway.webhookPath must start with '/' and name a path".into(),
            ));
        }
        if [PUSH_PATH, HEALTH_PATH].contains(&g.webhook_path.as_str()) {
            return Err(LinehookError::Config(format!(
                "gateway.webhookPath {} collides with a built-in route",
                g.webhook_path
            )));
        }
        if g.max_body_bytes == 0 {
            return Err(LinehookError::Config(
                "gateway.maxBodyBytes must be > 0".into(),
            ));
        }
        Ok(())
    }

    fn validate_dispatch(&self) -> Result<(), LinehookError> {
        let d = &self.dispatch;

        if d.dedup_capacity == 0 {
            return Err(LinehookError::Config(
                "dispatch.dedupCapacity must be > 0".into(),
            ));
        }
        if d.help_text.trim().is_empty() {
            return Err(LinehookError::Config(
                "dispatch.helpText must not be empty".into(),
            ));
        }
        let acknowledges = d.sticker_reply == StickerReplyMode::Acknowledge;
        if acknowledges && d.sticker_ack_text.trim().is_empty() {
            return Err(LinehookError::Config(
                "dispatch.stickerAckText must not be empty when stickerReply is acknowledge".into(),
            ));
        }
        if d.image_ack_text.trim().is_empty() {
            return Err(LinehookError::Config(
                "dispatch.imageAckText must not be empty".into(),
            ));
        }
        if let Some(mention) = &d.group_mention
            && mention.trim().is_empty()
        {
            return Err(LinehookError::Config(
                "dispatch.groupMention must not be blank when set".into(),
            ));
        }
        Ok(())
    }

    fn validate_reply(&self) -> Result<(), LinehookError> {
        let r = &self.reply;

        if r.max_retries > 10 {
            return Err(LinehookError::Config(
                "reply.maxRetries is unreasonably large (> 10); reply tokens expire quickly".into(),
            ));
        }
        if r.backoff_multiplier.is_nan()
            || r.backoff_multiplier.is_infinite()
            || r.backoff_multiplier < 1.0
        {
            return Err(LinehookError::Config(
                "reply.backoffMultiplier must be a finite number >= 1.0".into(),
            ));
        }
        if r.initial_delay_ms > r.max_delay_ms {
            return Err(LinehookError::Config(
                "reply.initialDelayMs must be <= reply.maxDelayMs".into(),
            ));
        }
        if r.consumed_token_capacity == 0 {
            return Err(LinehookError::Config(
                "reply.consumedTokenCapacity must be > 0".into(),
            ));
        }
        if r.max_delay_ms > MAX_REPLY_DELAY_MS {
            return Err(LinehookError::Config(format!(
                "reply.maxDelayMs must be <= {MAX_REPLY_DELAY_MS}"
            )));
        }
        if r.max_delay_ms > 30_000 {
            warn!("reply.maxDelayMs is very long (> 30s), reply tokens may expire before retrying");
        }
        Ok(())
    }
}

use thiserror::Error;

/// Typed error hierarchy for linehook.
///
/// Use at module boundaries (signature checks, decoding, dispatch, outbound calls,
/// config validation). Internal/leaf functions can keep using `anyhow::Result`;
/// the `Internal` variant converts via the `?` operator.
#[derive(Debug, Error)]
pub enum LinehookError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The delivery was not signed with the channel secret. Rejects the whole batch.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// The delivery body is not an `{"events": [...]}` document. Rejects the whole batch.
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// One event in an otherwise valid delivery could not be decoded.
    #[error("Malformed event at index {index}: {reason}")]
    MalformedEvent { index: usize, reason: String },

    #[error("Handler failed for {event}: {message}")]
    Handler { event: String, message: String },

    /// Timeout, refused or dropped connection, or 5xx from the messaging API.
    #[error("Transient reply failure{}: {message}", fmt_status(.status))]
    ReplyTransient {
        status: Option<u16>,
        message: String,
    },

    /// 4xx from the messaging API, or a reply token that was already used.
    #[error("Permanent reply failure{}: {message}", fmt_status(.status))]
    ReplyPermanent {
        status: Option<u16>,
        message: String,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[allow(clippy::ref_option)]
fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl LinehookError {
    /// Whether the failed operation may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ReplyTransient { .. } => true,
            Self::Config(_)
            | Self::InvalidSignature
            | Self::MalformedPayload(_)
            | Self::MalformedEvent { .. }
            | Self::Handler { .. }
            | Self::ReplyPermanent { .. }
            | Self::Internal(_) => false,
        }
    }

    /// Whether this error rejects a whole delivery rather than a single event.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::InvalidSignature | Self::MalformedPayload(_))
    }
}

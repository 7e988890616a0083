//! Outbound calls to the messaging API, with bounded retry.
//!
//! [`MessagingApi`] is the seam: production code talks to LINE through
//! [`LineMessagingClient`], tests substitute a recorder or point the client at a
//! mock server.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ReplyConfig;
use crate::dispatch::{OutboundMessage, ReplyAction};
use crate::errors::LinehookError;
use crate::utils::http::{ERROR_BODY_LIMIT, default_http_client, limited_text};

/// Idempotency header for push calls.
pub const RETRY_KEY_HEADER: &str = "X-Line-Retry-Key";

#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// Answer an event through its reply token.
    async fn reply_message(
        &self,
        reply_token: &str,
        messages: &[OutboundMessage],
    ) -> Result<(), LinehookError>;

    /// Send to a user, group or room unprompted. `retry_key` must be reused
    /// verbatim when the same push is retried.
    async fn push_message(
        &self,
        to: &str,
        messages: &[OutboundMessage],
        retry_key: &str,
    ) -> Result<(), LinehookError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: &'a [OutboundMessage],
}

#[derive(Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: &'a [OutboundMessage],
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// The LINE Messaging API over HTTPS.
pub struct LineMessagingClient {
    client: Client,
    api_base: String,
    access_token: String,
}

impl LineMessagingClient {
    pub fn new(api_base: &str, access_token: impl Into<String>) -> Self {
        Self::with_client(default_http_client(), api_base, access_token)
    }

    pub fn with_client(client: Client, api_base: &str, access_token: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    async fn post<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        retry_key: Option<&str>,
    ) -> Result<StatusCode, LinehookError> {
        let mut req = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.access_token)
            .json(body);
        if let Some(key) = retry_key {
            req = req.header(RETRY_KEY_HEADER, key);
        }

        let resp = req.send().await.map_err(classify_transport_error)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(status);
        }
        if status == StatusCode::CONFLICT && retry_key.is_some() {
            return Ok(status);
        }

        let text = limited_text(resp, ERROR_BODY_LIMIT)
            .await
            .unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|b| b.message)
            .unwrap_or(text);
        Err(classify_status(status, message))
    }
}

#[async_trait]
impl MessagingApi for LineMessagingClient {
    async fn reply_message(
        &self,
        reply_token: &str,
        messages: &[OutboundMessage],
    ) -> Result<(), LinehookError> {
        self.post(
            "/v2/bot/message/reply",
            &ReplyRequest {
                reply_token,
                messages,
            },
            None,
        )
        .await?;
        Ok(())
    }

    async fn push_message(
        &self,
        to: &str,
        messages: &[OutboundMessage],
        retry_key: &str,
    ) -> Result<(), LinehookError> {
        let status = self
            .post(
                "/v2/bot/message/push",
                &PushRequest { to, messages },
                Some(retry_key),
            )
            .await?;
        if status == StatusCode::CONFLICT {
            info!(
                "reply: push with retry key {} already accepted (409)",
                retry_key
            );
        }
        Ok(())
    }
}

/// 5xx is worth retrying; every other non-success status is final.
pub(crate) fn classify_status(status: StatusCode, message: String) -> LinehookError {
    let status_code = Some(status.as_u16());
    if status.is_server_error() {
        LinehookError::ReplyTransient {
            status: status_code,
            message,
        }
    } else {
        LinehookError::ReplyPermanent {
            status: status_code,
            message,
        }
    }
}

/// Timeouts, refused connections and connections dropped mid-request are transient.
fn classify_transport_error(e: reqwest::Error) -> LinehookError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        LinehookError::ReplyTransient {
            status: None,
            message: e.to_string(),
        }
    } else {
        LinehookError::ReplyPermanent {
            status: None,
            message: e.to_string(),
        }
    }
}

/// Delay before retry number `attempt + 1`, without jitter.
pub(crate) fn backoff_delay_ms(policy: &ReplyConfig, attempt: u32) -> u64 {
    let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
    (policy.initial_delay_ms as f64 * policy.backoff_multiplier.powi(exp))
        .min(policy.max_delay_ms as f64) as u64
}

/// `base` plus up to 25% jitter.
pub(crate) fn with_jitter(base: u64) -> u64 {
    let jitter = (base as f64 * 0.25 * fastrand::f64()) as u64;
    base.saturating_add(jitter)
}

/// Sends replies and pushes, retrying transient failures.
pub struct ReplySender {
    api: Arc<dyn MessagingApi>,
    policy: ReplyConfig,
    consumed: Mutex<LruCache<String, ()>>,
}

impl ReplySender {
    pub fn new(api: Arc<dyn MessagingApi>, policy: ReplyConfig) -> Self {
        let capacity =
            NonZeroUsize::new(policy.consumed_token_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            api,
            policy,
            consumed: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Deliver one reply action.
    ///
    /// The token is marked consumed before the first attempt, so a second call
    /// with the same token fails without reaching the API.
    pub async fn send(&self, action: ReplyAction) -> Result<(), LinehookError> {
        let ReplyAction {
            reply_token,
            messages,
        } = action;
        let token = reply_token.as_str();

        {
            let mut consumed = self
                .consumed
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if consumed.contains(token) {
                warn!("reply: token already used, not sending");
                return Err(LinehookError::ReplyPermanent {
                    status: None,
                    message: "reply token already consumed".into(),
                });
            }
            consumed.put(token.to_string(), ());
        }

        self.with_retry("reply", || self.api.reply_message(token, &messages))
            .await
    }

    /// Push `messages` to a chat. One retry key covers every attempt.
    pub async fn push(&self, to: &str, messages: &[OutboundMessage]) -> Result<(), LinehookError> {
        let retry_key = Uuid::new_v4().to_string();
        self.with_retry("push", || self.api.push_message(to, messages, &retry_key))
            .await
    }

    async fn with_retry<F, Fut>(&self, op: &str, mut call: F) -> Result<(), LinehookError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), LinehookError>>,
    {
        let max_retries = self.policy.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                debug!("reply: {} retry attempt {}/{}", op, attempt, max_retries);
            }
            match call().await {
                Ok(()) => {
                    debug!("reply: {} succeeded on attempt {}", op, attempt);
                    return Ok(());
                }
                Err(e) => {
                    warn!("reply: {} failed on attempt {}: {}", op, attempt, e);
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    last_error = Some(e);
                    if attempt < max_retries {
                        let base = backoff_delay_ms(&self.policy, attempt);
                        let total = with_jitter(base);
                        debug!("reply: waiting {}ms before retry ({}ms base)", total, base);
                        tokio::time::sleep(Duration::from_millis(total)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LinehookError::ReplyTransient {
            status: None,
            message: format!("{} failed after {} retries", op, max_retries),
        }))
    }
}

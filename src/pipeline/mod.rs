//! One webhook delivery end to end: verify, decode, then dispatch and reply per event.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use futures_util::future::join_all;
use lru::LruCache;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dispatch::{DispatchResult, Dispatcher};
use crate::errors::LinehookError;
use crate::events::{InboundEvent, decode_events};
use crate::reply::{LineMessagingClient, MessagingApi, ReplySender};
use crate::signature::require_valid_signature;

/// Per-delivery counters returned to the webhook caller.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub received: usize,
    pub replied: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventOutcome {
    Replied,
    Skipped,
    Duplicate,
    Failed,
}

impl DeliveryReport {
    fn record(&mut self, outcome: EventOutcome) {
        match outcome {
            EventOutcome::Replied => self.replied += 1,
            EventOutcome::Skipped => self.skipped += 1,
            EventOutcome::Duplicate => self.duplicates += 1,
            EventOutcome::Failed => self.failed += 1,
        }
    }
}

pub struct WebhookPipeline {
    channel_secret: String,
    dispatcher: Dispatcher,
    sender: ReplySender,
    concurrent: bool,
    seen: Mutex<LruCache<String, ()>>,
}

impl WebhookPipeline {
    pub fn new(config: &Config, api: Arc<dyn MessagingApi>) -> Self {
        let capacity =
            NonZeroUsize::new(config.dispatch.dedup_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            channel_secret: config.line.channel_secret.clone(),
            dispatcher: Dispatcher::new(config.dispatch.clone()),
            sender: ReplySender::new(api, config.reply.clone()),
            concurrent: config.dispatch.concurrent_events,
            seen: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Pipeline talking to the LINE API named in `config`.
    pub fn from_config(config: &Config) -> Self {
        let client =
            LineMessagingClient::new(&config.line.api_base, &config.line.channel_access_token);
        Self::new(config, Arc::new(client))
    }

    pub fn sender(&self) -> &ReplySender {
        &self.sender
    }

    /// Handle one delivery. Only signature and payload errors escape; every
    /// per-event failure is logged and counted instead.
    pub async fn handle_delivery(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<DeliveryReport, LinehookError> {
        require_valid_signature(&self.channel_secret, signature, body)?;
        let batch = decode_events(body)?;

        let mut report = DeliveryReport {
            received: batch.len(),
            ..DeliveryReport::default()
        };
        debug!(
            "pipeline: {} event(s) for destination {}",
            batch.len(),
            batch.destination.as_deref().unwrap_or("-")
        );

        let outcomes = if self.concurrent {
            join_all(batch.events.into_iter().map(|e| self.process(e))).await
        } else {
            let mut outcomes = Vec::with_capacity(report.received);
            for event in batch.events {
                outcomes.push(self.process(event).await);
            }
            outcomes
        };

        for outcome in outcomes {
            report.record(outcome);
        }
        info!(
            "pipeline: delivery done: received={} replied={} skipped={} duplicates={} failed={}",
            report.received, report.replied, report.skipped, report.duplicates, report.failed
        );
        Ok(report)
    }

    async fn process(&self, event: Result<InboundEvent, LinehookError>) -> EventOutcome {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                warn!("pipeline: {}", e);
                return EventOutcome::Failed;
            }
        };

        if let Some(key) = event.dedup_key()
            && self.mark_seen(key.clone())
        {
            info!("pipeline: duplicate event {}, skipping", key);
            return EventOutcome::Duplicate;
        }
        if event.is_redelivery {
            debug!(
                "pipeline: processing redelivered {} event",
                event.kind.label()
            );
        }

        let label = event.kind.label().to_string();
        let action = match self.dispatcher.dispatch(event) {
            Ok(DispatchResult::Reply(action)) => action,
            Ok(DispatchResult::NoOp(reason)) => {
                debug!("pipeline: {} event skipped: {:?}", label, reason);
                return EventOutcome::Skipped;
            }
            Err(e) => {
                warn!("pipeline: {}", e);
                return EventOutcome::Failed;
            }
        };

        let count = action.messages.len();
        match self.sender.send(action).await {
            Ok(()) => {
                debug!(
                    "pipeline: replied to {} event with {} message(s)",
                    label, count
                );
                EventOutcome::Replied
            }
            Err(e) => {
                error!("pipeline: reply to {} event failed: {}", label, e);
                EventOutcome::Failed
            }
        }
    }

    /// Record `key`; returns true if it had already been seen.
    fn mark_seen(&self, key: String) -> bool {
        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        seen.put(key, ()).is_some()
    }
}

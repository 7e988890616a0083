//! HTTP surface: the LINE webhook, an authenticated push endpoint and a health check.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};

use crate::config::{Config, LineConfig};
use crate::dispatch::chunk_text;
use crate::errors::LinehookError;
use crate::pipeline::WebhookPipeline;
use crate::signature::SIGNATURE_HEADER;

pub const PUSH_PATH: &str = "/line/push";
pub const HEALTH_PATH: &str = "/api/health";

/// Shared state for all handlers. Read-only after startup.
#[derive(Clone)]
pub struct GatewayState {
    pipeline: Arc<WebhookPipeline>,
    line: Arc<LineConfig>,
    push_token: Arc<str>,
    max_body_bytes: usize,
}

impl GatewayState {
    pub fn new(config: &Config, pipeline: Arc<WebhookPipeline>) -> Self {
        Self {
            pipeline,
            line: Arc::new(config.line.clone()),
            push_token: Arc::from(config.gateway.push_token.as_str()),
            max_body_bytes: config.gateway.max_body_bytes,
        }
    }
}

/// Request body for `POST /line/push`.
#[derive(Debug, Deserialize)]
pub struct PushRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "groupId")]
    pub group_id: Option<String>,
}

pub fn build_router(webhook_path: &str, state: GatewayState) -> Router {
    let mut router = Router::new()
        .route(webhook_path, post(webhook_handler))
        .route(HEALTH_PATH, get(health_handler));

    if state.push_token.is_empty() {
        debug!("gateway: push endpoint disabled (no pushToken)");
    } else {
        router = router.route(PUSH_PATH, post(push_handler));
    }

    let limit = state.max_body_bytes;
    router.layer(DefaultBodyLimit::max(limit)).with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION
    }))
}

/// POST {webhookPath}: one signed delivery from the platform.
async fn webhook_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.len() > state.max_body_bytes {
        warn!("webhook: payload too large ({} bytes)", body.len());
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    }

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    debug!(
        "webhook: delivery received, payload_len={}, signed={}",
        body.len(),
        signature.is_some()
    );

    match state.pipeline.handle_delivery(&body, signature).await {
        Ok(report) => {
            let mut payload = json!({ "status": "ok" });
            if let (Some(obj), Ok(serde_json::Value::Object(counts))) =
                (payload.as_object_mut(), serde_json::to_value(report))
            {
                obj.extend(counts);
            }
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(e) if e.is_batch_fatal() => {
            warn!("webhook: rejecting delivery: {}", e);
            let (status, reason) = match e {
                LinehookError::InvalidSignature => (StatusCode::UNAUTHORIZED, "invalid signature"),
                _ => (StatusCode::BAD_REQUEST, "malformed payload"),
            };
            (status, Json(json!({ "error": reason }))).into_response()
        }
        Err(e) => {
            error!("webhook: unexpected failure: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"status": "error", "error": message}))).into_response()
}

fn bearer_matches(headers: &HeaderMap, expected: &str) -> bool {
    let Some(provided) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    else {
        return false;
    };
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// POST /line/push: send a message to a configured group.
async fn push_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Result<Json<PushRequest>, JsonRejection>,
) -> Response {
    if !bearer_matches(&headers, &state.push_token) {
        warn!("push: missing or invalid bearer token");
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    let Json(req) = match body {
        Ok(req) => req,
        Err(e) => {
            debug!("push: bad request body: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "invalid request body");
        }
    };

    if req.message.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "message must not be empty");
    }

    let target = match req.group_id.as_deref().filter(|g| !g.is_empty()) {
        Some(group_id) => {
            if !state.line.is_group_allowed(group_id) {
                warn!("push: group {} is not in the allow-list", group_id);
                return error_response(StatusCode::FORBIDDEN, "group not allowed");
            }
            group_id.to_string()
        }
        None => match state.line.allowed_group_ids.first() {
            Some(group_id) => group_id.clone(),
            None => {
                return error_response(StatusCode::BAD_REQUEST, "no target group configured");
            }
        },
    };

    let messages = chunk_text(&req.message);
    match state.pipeline.sender().push(&target, &messages).await {
        Ok(()) => {
            info!("push: sent {} message(s) to {}", messages.len(), target);
            (StatusCode::OK, Json(json!({"status": "success"}))).into_response()
        }
        Err(e) => {
            error!("push: sending to {} failed: {}", target, e);
            error_response(StatusCode::BAD_GATEWAY, "failed to send message")
        }
    }
}

/// Bind and serve until `shutdown` resolves.
pub async fn start<F>(
    config: &Config,
    pipeline: Arc<WebhookPipeline>,
    shutdown: F,
) -> Result<tokio::task::JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = GatewayState::new(config, pipeline);
    let app = build_router(&config.gateway.webhook_path, state);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        "gateway: listening on {} (webhook at {})",
        addr, config.gateway.webhook_path
    );

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("gateway: server error: {}", e);
        }
    });

    Ok(handle)
}

// Shared test helpers, not all items used by every test binary.
#![allow(unused)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use linehook::config::Config;
use linehook::gateway::{GatewayState, build_router};
use linehook::pipeline::WebhookPipeline;
use linehook::signature::{SIGNATURE_HEADER, sign_body};
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::MockServer;

pub const SECRET: &str = "integration-channel-secret";
pub const ACCESS_TOKEN: &str = "integration-access-token";

/// Config pointing at `api_base`, with millisecond backoff so retry tests stay fast.
pub fn test_config(api_base: &str) -> Config {
    let mut config = Config::default();
    config.line.channel_secret = SECRET.to_string();
    config.line.channel_access_token = ACCESS_TOKEN.to_string();
    config.line.api_base = api_base.to_string();
    config.reply.initial_delay_ms = 1;
    config.reply.max_delay_ms = 5;
    config
}

/// Router wired exactly as `linehook gateway` wires it, talking to `server`.
pub fn gateway_for(server: &MockServer) -> Router {
    gateway_with(&test_config(&server.uri()))
}

pub fn gateway_with(config: &Config) -> Router {
    let pipeline = Arc::new(WebhookPipeline::from_config(config));
    build_router(
        &config.gateway.webhook_path,
        GatewayState::new(config, pipeline),
    )
}

pub fn text_event(event_id: &str, text: &str, reply_token: &str) -> Value {
    json!({
        "type": "message",
        "mode": "active",
        "timestamp": 1_700_000_000_000_i64,
        "webhookEventId": event_id,
        "deliveryContext": {"isRedelivery": false},
        "source": {"type": "user", "userId": "U206d25c2ea6bd87c17655609a1c37cb8"},
        "replyToken": reply_token,
        "message": {"type": "text", "id": format!("msg-{event_id}"), "text": text}
    })
}

pub fn delivery(events: &[Value]) -> Vec<u8> {
    serde_json::to_vec(&json!({"destination": "Uxxxxxxxxxxxxxx", "events": events})).unwrap()
}

pub fn signed_request(body: Vec<u8>) -> Request<Body> {
    let sig = sign_body(SECRET, &body).unwrap();
    request_with_signature(body, Some(&sig))
}

pub fn request_with_signature(body: Vec<u8>, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/line/webhook")
        .header("content-type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header(SIGNATURE_HEADER, sig);
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn json_body(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 65536).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

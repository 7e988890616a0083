use super::*;
use crate::config::{StickerReplyMode, UnrecognizedTextMode};

#[test]
fn test_load_config_missing_file_returns_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist.json");
    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.gateway.port, 8000);
    assert_eq!(config.line.api_base, "https://api.line.me");
}

#[test]
fn test_load_config_minimal_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{}").unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.gateway.webhook_path, "/line/webhook");
    assert_eq!(config.dispatch.dedup_capacity, 500);
}

#[test]
fn test_load_config_reads_sections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{
            "gateway": {"host": "127.0.0.1", "port": 9100, "webhookPath": "/hooks/line"},
            "dispatch": {"unrecognizedText": "ignore", "stickerReply": "acknowledge"},
            "reply": {"maxRetries": 2, "initialDelayMs": 100, "maxDelayMs": 400}
        }"#,
    )
    .unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.gateway.host, "127.0.0.1");
    assert_eq!(config.gateway.port, 9100);
    assert_eq!(config.gateway.webhook_path, "/hooks/line");
    assert_eq!(
        config.dispatch.unrecognized_text,
        UnrecognizedTextMode::Ignore
    );
    assert_eq!(config.dispatch.sticker_reply, StickerReplyMode::Acknowledge);
    assert_eq!(config.reply.max_retries, 2);
    assert_eq!(config.reply.max_delay_ms, 400);
}

#[test]
fn test_load_config_invalid_json_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = load_config(Some(&path)).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse config JSON"));
}

#[test]
fn test_load_config_runs_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"gateway": {"port": 0}}"#).unwrap();

    let err = load_config(Some(&path)).unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("Configuration validation failed"));
    assert!(chain.contains("gateway.port"));
}

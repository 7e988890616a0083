use anyhow::Result;
use reqwest::{Client, Response};
use std::time::Duration;

/// Cap on how much of an API error body is kept for logs and error messages.
pub const ERROR_BODY_LIMIT: usize = 4 * 1024;

/// Build the outbound `reqwest::Client` (5 s connect, 15 s overall).
///
/// Reply tokens expire quickly, so the overall timeout is kept short; a timed
/// out request is retried like any other transient failure.
pub fn default_http_client() -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(15))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Read at most `max_bytes` of a response body, streaming chunk by chunk.
///
/// Returns `(bytes, was_truncated)`.
pub async fn limited_body(resp: Response, max_bytes: usize) -> Result<(Vec<u8>, bool)> {
    let mut buf = Vec::new();
    let mut stream = resp;
    while let Some(chunk) = stream.chunk().await? {
        if buf.len() + chunk.len() > max_bytes {
            let remaining = max_bytes.saturating_sub(buf.len());
            buf.extend_from_slice(&chunk[..remaining]);
            return Ok((buf, true));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok((buf, false))
}

/// Same as [`limited_body`], decoded lossily as UTF-8 with a `[truncated]` marker.
pub async fn limited_text(resp: Response, max_bytes: usize) -> Result<String> {
    let (bytes, truncated) = limited_body(resp, max_bytes).await?;
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if truncated {
        text.push_str("\n[truncated]");
    }
    Ok(text)
}

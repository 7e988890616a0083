//! Webhook signature verification.
//!
//! LINE signs every delivery with HMAC-SHA256 keyed by the channel secret and sends
//! the base64 digest in `X-Line-Signature`. Verification must run over the exact
//! bytes received; re-serializing the JSON first changes the digest.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::LinehookError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "X-Line-Signature";

fn compute(secret: &str, body: &[u8]) -> Option<String> {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return None;
    };
    mac.update(body);
    Some(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Compute the base64 HMAC-SHA256 signature of `body` under `secret`.
pub fn sign_body(secret: &str, body: &[u8]) -> Result<String, LinehookError> {
    compute(secret, body)
        .ok_or_else(|| LinehookError::Internal(anyhow::anyhow!("failed to initialise HMAC")))
}

/// Check `signature` against the body in constant time.
pub fn verify_signature(secret: &str, signature: &str, body: &[u8]) -> bool {
    let Some(expected) = compute(secret, body) else {
        return false;
    };
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

/// Like [`verify_signature`] but treats a missing header as invalid and returns
/// a typed error.
pub fn require_valid_signature(
    secret: &str,
    signature: Option<&str>,
    body: &[u8],
) -> Result<(), LinehookError> {
    match signature {
        Some(sig) if verify_signature(secret, sig, body) => Ok(()),
        _ => Err(LinehookError::InvalidSignature),
    }
}

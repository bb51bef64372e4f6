//! HMAC-SHA256 payload signing.
//!
//! The signature covers the exact request body bytes and is sent hex-encoded
//! in `X-Webhook-Signature`. Subscribers recompute it with their copy of the
//! shared secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute the lowercase hex HMAC-SHA256 of `body` keyed with `secret`.
pub fn sign_payload(body: &[u8], secret: &str) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex signature against `body` using constant-time comparison.
///
/// Accepts upper- or lowercase hex.
pub fn verify_signature(signature_hex: &str, body: &[u8], secret: &str) -> bool {
    let computed = sign_payload(body, secret);
    let provided = signature_hex.trim().to_ascii_lowercase();
    computed.as_bytes().ct_eq(provided.as_bytes()).into()
}

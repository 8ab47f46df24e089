//! Status-callback signature verification.
//!
//! The status webhook is unauthenticated at the HTTP layer; instead the
//! transport signs each callback body with HMAC-SHA256 over the raw bytes
//! using the shared auth token. Comparison is constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Verify a hex-encoded HMAC-SHA256 signature over `body`.
pub fn verify_signature(auth_token: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(provided) = hex::decode(signature_hex) else {
        return false;
    };

    let mut mac = HmacSha256::new_from_slice(auth_token.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    expected.ct_eq(provided.as_slice()).into()
}

/// Compute the hex signature for a body. Test and client helper.
pub fn sign(auth_token: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(auth_token.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

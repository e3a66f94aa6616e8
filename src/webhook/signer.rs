//! HMAC-SHA256 webhook signing (§4.I): produces and verifies the
//! `X-Webhook-Signature: sha256=<hex>` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Signs `body` with `secret`, returning the full header value.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    format!("sha256={}", hex::encode(digest))
}

/// Verifies `signature_header` (as received) against `body` signed with `secret`.
/// Uses the MAC crate's constant-time comparison to avoid timing side channels.
pub fn verify(secret: &str, body: &[u8], signature_header: &str) -> bool {
    let Some(hex_digest) = signature_header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected_bytes) = hex::decode(hex_digest) else {
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&expected_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_produces_the_expected_prefix_and_length() {
        let header = sign("secret", b"payload");
        assert!(header.starts_with("sha256="));
        assert_eq!(header.len(), "sha256=".len() + 64);
    }

    #[test]
    fn verify_accepts_its_own_signature() {
        let header = sign("secret", b"payload");
        assert!(verify("secret", b"payload", &header));
    }

    #[test]
    fn verify_rejects_tampered_body() {
        let header = sign("secret", b"payload");
        assert!(!verify("secret", b"tampered", &header));
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let header = sign("secret", b"payload");
        assert!(!verify("other-secret", b"payload", &header));
    }

    #[test]
    fn verify_rejects_malformed_header() {
        assert!(!verify("secret", b"payload", "not-a-signature"));
    }
}

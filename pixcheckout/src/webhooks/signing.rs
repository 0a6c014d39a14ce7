//! HMAC-SHA256 signatures for gateway webhooks.
//!
//! The gateway signs the raw request body with the shared webhook secret and sends the
//! lowercase hex digest in the `x-primepag-signature` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex signature against `body`. The comparison is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let body = br#"{"id":"tx_1","external_id":"abc","status":"paid"}"#;
        let signature = sign("whsec_test", body);

        assert_eq!(signature.len(), 64);
        assert!(verify_signature("whsec_test", body, &signature));
        assert!(verify_signature("whsec_test", body, &signature.to_uppercase()));

        assert!(!verify_signature("whsec_test", b"tampered", &signature));
        assert!(!verify_signature("other", body, &signature));
    }

    #[test]
    fn test_known_digest() {
        // RFC 4231 test case 2
        assert_eq!(
            sign("Jefe", b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_malformed_signature() {
        assert!(!verify_signature("secret", b"body", "not-hex"));
        assert!(!verify_signature("secret", b"body", ""));
        assert!(!verify_signature("secret", b"body", "abcd"));
    }
}

//! Webhook signature verification.
//!
//! Novac signs webhook deliveries with HMAC-SHA256 over the raw request
//! body and sends the hex digest in the `x-novac-signature` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verifies the hex-encoded HMAC-SHA256 signature of a raw webhook body.
/// Comparison happens inside the hmac crate in constant time.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_passes() {
        let body = br#"{"reference":"don-42-abc","status":"success"}"#;
        let signature = sign("whsec_test", body);
        assert!(verify_webhook_signature("whsec_test", body, &signature));
    }

    #[test]
    fn tampered_body_fails() {
        let body = br#"{"reference":"don-42-abc","status":"success"}"#;
        let signature = sign("whsec_test", body);
        let tampered = br#"{"reference":"don-42-abc","status":"failed"}"#;
        assert!(!verify_webhook_signature("whsec_test", tampered, &signature));
    }

    #[test]
    fn wrong_secret_fails() {
        let body = br#"{"reference":"don-42-abc","status":"success"}"#;
        let signature = sign("whsec_test", body);
        assert!(!verify_webhook_signature("whsec_other", body, &signature));
    }

    #[test]
    fn non_hex_signature_fails() {
        assert!(!verify_webhook_signature("whsec_test", b"{}", "not hex at all"));
    }

    #[test]
    fn whitespace_around_signature_is_tolerated() {
        let body = b"payload";
        let signature = format!("  {}  ", sign("whsec_test", body));
        assert!(verify_webhook_signature("whsec_test", body, &signature));
    }
}

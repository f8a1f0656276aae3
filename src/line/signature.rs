//! X-Line-Signature verification: base64(HMAC-SHA256(channel_secret, body)).

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verifies the webhook signature against the tenant's channel secret.
pub fn verify(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = BASE64.encode(mac.finalize().into_bytes());
    expected == signature
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        BASE64.encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_matching_signature() {
        let body = br#"{"events":[]}"#;
        let sig = sign("secret-1", body);
        assert!(verify("secret-1", body, &sig));
    }

    #[test]
    fn rejects_tampered_body() {
        let sig = sign("secret-1", br#"{"events":[]}"#);
        assert!(!verify("secret-1", br#"{"events":[{}]}"#, &sig));
    }

    #[test]
    fn rejects_wrong_secret() {
        let body = br#"{"events":[]}"#;
        let sig = sign("secret-1", body);
        assert!(!verify("secret-2", body, &sig));
    }
}

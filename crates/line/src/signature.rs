use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Checks `X-Line-Signature`: base64 of the HMAC-SHA256 of the raw body keyed with
/// the channel secret. The comparison runs in constant time.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Computes the signature LINE would send for `body`, for building signed test requests.
#[cfg(any(test, feature = "test-utils"))]
pub fn sign_body(channel_secret: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(channel_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::{sign_body, verify_signature};

    #[test]
    fn accepts_matching_signature() {
        let body = br#"{"destination":"U1","events":[]}"#;
        let signature = sign_body("channel-secret", body);
        assert!(!signature.is_empty());
        assert!(verify_signature("channel-secret", body, &signature));
    }

    #[test]
    fn rejects_tampered_body_wrong_secret_and_garbage() {
        let body = br#"{"destination":"U1","events":[]}"#;
        let signature = sign_body("channel-secret", body);

        let tampered = br#"{"destination":"U2","events":[]}"#;
        assert!(!verify_signature("channel-secret", tampered, &signature));
        assert!(!verify_signature("other-secret", body, &signature));
        assert!(!verify_signature("channel-secret", body, "not base64!!"));
        assert!(!verify_signature("channel-secret", body, ""));
    }
}

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Everything a request signature covers.
#[derive(Debug, Clone, Copy)]
pub struct SigningInput<'a> {
    pub method: &'a str,
    /// Path plus query string, exactly as sent.
    pub path: &'a str,
    pub timestamp: i64,
    pub nonce: &'a str,
    /// Forwarded identity headers joined with `\n` in a fixed order.
    pub identity: &'a str,
    pub body: &'a [u8],
}

impl SigningInput<'_> {
    fn payload(&self) -> String {
        let body_hash = hex::encode(Sha256::digest(self.body));
        let identity_hash = hex::encode(Sha256::digest(self.identity.as_bytes()));
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.method, self.path, self.timestamp, self.nonce, identity_hash, body_hash
        )
    }
}

/// Generate HMAC-SHA256 signature
///
/// Format: HMAC-SHA256(method|path|timestamp|nonce|identity_hash|body_hash, secret)
pub fn generate_signature(
    secret: &str,
    input: &SigningInput<'_>,
) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;
    mac.update(input.payload().as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify HMAC-SHA256 signature using constant-time comparison
pub fn verify_signature(
    secret: &str,
    input: &SigningInput<'_>,
    signature: &str,
) -> Result<bool, anyhow::Error> {
    let expected = generate_signature(secret, input)?;
    let provided = signature.trim().to_ascii_lowercase();

    if expected.len() != provided.len() {
        return Ok(false);
    }

    Ok(expected.as_bytes().ct_eq(provided.as_bytes()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "my_secret_key";

    fn input<'a>(identity: &'a str, body: &'a [u8]) -> SigningInput<'a> {
        SigningInput {
            method: "POST",
            path: "/jobs",
            timestamp: 1678886400,
            nonce: "random_nonce_123",
            identity,
            body,
        }
    }

    #[test]
    fn test_signature_generation_and_verification() {
        let signed = input("owner-1\n", br#"{"service":"Full Wash"}"#);
        let signature = generate_signature(SECRET, &signed).unwrap();
        assert!(!signature.is_empty());

        assert!(verify_signature(SECRET, &signed, &signature).unwrap());
    }

    #[test]
    fn test_wrong_secret() {
        let signed = input("owner-1\n", b"{}");
        let signature = generate_signature("other_secret", &signed).unwrap();

        assert!(!verify_signature(SECRET, &signed, &signature).unwrap());
    }

    #[test]
    fn test_tampered_body() {
        let signature = generate_signature(SECRET, &input("owner-1\n", br#"{"a":1}"#)).unwrap();

        let tampered = input("owner-1\n", br#"{"a":2}"#);
        assert!(!verify_signature(SECRET, &tampered, &signature).unwrap());
    }

    #[test]
    fn test_identity_is_covered() {
        let signature = generate_signature(SECRET, &input("owner-1\n", b"")).unwrap();

        let escalated = input("owner-1\nsuper_admin", b"");
        assert!(!verify_signature(SECRET, &escalated, &signature).unwrap());
    }
}

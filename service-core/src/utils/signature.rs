use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute a hex-encoded HMAC-SHA256 over `payload`.
pub fn hmac_sha256_hex(secret: &str, payload: &str) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Compare two hex signatures in constant time.
pub fn signatures_match(expected: &str, provided: &str) -> bool {
    let expected_bytes = expected.as_bytes();
    let provided_bytes = provided.as_bytes();

    if expected_bytes.len() != provided_bytes.len() {
        return false;
    }

    expected_bytes.ct_eq(provided_bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_round_trip() {
        let secret = "my_secret_key";
        let payload = r#"{"foo":"bar"}"#;

        let signature = hmac_sha256_hex(secret, payload).unwrap();
        assert!(!signature.is_empty());
        assert!(signatures_match(&signature, &signature));
    }

    #[test]
    fn tampered_signature_rejected() {
        let signature = hmac_sha256_hex("my_secret_key", "payload").unwrap();
        let flipped = if signature.starts_with('a') { "b" } else { "a" };
        let tampered = format!("{}{}", flipped, &signature[1..]);
        assert!(!signatures_match(&signature, &tampered));
    }

    #[test]
    fn length_mismatch_rejected() {
        let signature = hmac_sha256_hex("my_secret_key", "payload").unwrap();
        assert!(!signatures_match(&signature, &signature[1..]));
    }
}

use ed25519_dalek::{Signer, SigningKey};

use crate::error::Result;

/// Sign a payload by hex-encoding it first, then signing the hex string.
/// This matches the `user_sign(x) => ed25519_sign(hex(x))` scheme.
pub async fn sign_hex_encoded_payload(payload: &[u8], signing_key: &SigningKey) -> Result<Vec<u8>> {
    let hex_encoded = hex::encode(payload);
    let signature = signing_key.sign(hex_encoded.as_bytes());
    Ok(signature.to_bytes().to_vec())
}

/// Sign a payload directly (used for session-based signing).
/// This matches the `session_sign(x) => ed25519_sign(x)` scheme.
pub async fn sign_raw_payload(payload: &[u8], signing_key: &SigningKey) -> Result<Vec<u8>> {
    let signature = signing_key.sign(payload);
    Ok(signature.to_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_hex_encoded_payload() {
        let key = SigningKey::from_bytes(&[9u8; 32]);
        let sig = sign_hex_encoded_payload(b"hello", &key).await.unwrap();
        assert_eq!(sig.len(), 64);
    }

    #[tokio::test]
    async fn test_sign_raw_payload() {
        let key = SigningKey::from_bytes(&[9u8; 32]);
        let sig = sign_raw_payload(b"hello", &key).await.unwrap();
        assert_eq!(sig.len(), 64);
    }

    #[tokio::test]
    async fn test_raw_and_hex_signatures_differ() {
        let key = SigningKey::from_bytes(&[3u8; 32]);
        let raw_sig = sign_raw_payload(b"payload", &key).await.unwrap();
        let hex_sig = sign_hex_encoded_payload(b"payload", &key).await.unwrap();
        assert_ne!(raw_sig, hex_sig);
    }
}

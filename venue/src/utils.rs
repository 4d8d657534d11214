use crate::error::{Result, VenueError};
use crate::types::MarketInfo;

/// Decode a hex string (with optional `0x` prefix) to bytes.
pub fn decode_hex(value: &str) -> Vec<u8> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(stripped).expect("invalid hex string")
}

/// Find a market by its ID.
pub fn find_market(markets: &[MarketInfo], id: u32) -> Result<&MarketInfo> {
    markets
        .iter()
        .find(|m| m.market_id == id)
        .ok_or(VenueError::MarketNotFound(id))
}

/// Parse a private key from a bs58 string or raw bytes.
pub fn keypair_from_private_key(key: &str) -> Result<ed25519_dalek::SigningKey> {
    let bytes = bs58::decode(key)
        .into_vec()
        .map_err(|e| VenueError::Signing(format!("bs58 decode error: {e}")))?;

    // Accept either a 32-byte secret or a 64-byte keypair (first 32 bytes are the secret).
    let secret_bytes: [u8; 32] = if bytes.len() == 64 {
        bytes[..32]
            .try_into()
            .map_err(|_| VenueError::Signing("invalid key length".into()))?
    } else if bytes.len() == 32 {
        bytes
            .try_into()
            .map_err(|_| VenueError::Signing("invalid key length".into()))?
    } else {
        return Err(VenueError::Signing(format!(
            "unexpected key length: {}",
            bytes.len()
        )));
    };

    Ok(ed25519_dalek::SigningKey::from_bytes(&secret_bytes))
}

/// Check if a string looks like an RFC 3339 timestamp.
pub fn is_rfc3339(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hex_with_0x_prefix() {
        assert_eq!(decode_hex("0x0102"), vec![1, 2]);
        assert_eq!(decode_hex("0xff"), vec![255]);
    }

    #[test]
    fn test_decode_hex_without_prefix() {
        assert_eq!(decode_hex("abcd"), vec![0xab, 0xcd]);
        assert_eq!(decode_hex("00"), vec![0]);
    }

    #[test]
    fn test_decode_hex_empty() {
        assert_eq!(decode_hex(""), Vec::<u8>::new());
        assert_eq!(decode_hex("0x"), Vec::<u8>::new());
    }

    #[test]
    #[should_panic(expected = "invalid hex string")]
    fn test_decode_hex_invalid_panics() {
        decode_hex("0xGG");
    }

    #[test]
    fn test_is_rfc3339_valid() {
        assert!(is_rfc3339("2024-01-15T10:30:00Z"));
        assert!(is_rfc3339("2024-12-31T23:59:59.999Z"));
    }

    #[test]
    fn test_is_rfc3339_invalid() {
        assert!(!is_rfc3339("not a date"));
        assert!(!is_rfc3339("2024-01-15"));
        assert!(!is_rfc3339(""));
    }

    fn sample_markets() -> Vec<MarketInfo> {
        vec![MarketInfo {
            market_id: 1,
            symbol: "BTC-PERP".into(),
            price_decimals: 2,
            size_decimals: 4,
            base_token_id: 0,
            quote_token_id: 1,
            imf: 0.1,
            mmf: 0.05,
            cmf: 0.03,
        }]
    }

    #[test]
    fn test_find_market_found() {
        let markets = sample_markets();
        let m = find_market(&markets, 1).unwrap();
        assert_eq!(m.symbol, "BTC-PERP");
    }

    #[test]
    fn test_find_market_not_found() {
        let markets = sample_markets();
        let err = find_market(&markets, 99).unwrap_err();
        assert!(matches!(err, VenueError::MarketNotFound(99)));
    }

    #[test]
    fn test_keypair_from_private_key_32_bytes() {
        let secret = [1u8; 32];
        let encoded = bs58::encode(&secret).into_string();
        let key = keypair_from_private_key(&encoded).unwrap();
        assert_eq!(key.to_bytes(), secret);
    }

    #[test]
    fn test_keypair_from_private_key_64_bytes() {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&[2u8; 32]);
        let mut keypair_bytes = [0u8; 64];
        keypair_bytes[..32].copy_from_slice(&signing_key.to_bytes());
        keypair_bytes[32..].copy_from_slice(signing_key.verifying_key().as_bytes());
        let encoded = bs58::encode(&keypair_bytes).into_string();
        let key = keypair_from_private_key(&encoded).unwrap();
        assert_eq!(key.to_bytes(), [2u8; 32]);
    }

    #[test]
    fn test_keypair_from_private_key_bad_length() {
        let bad = bs58::encode(&[0u8; 16]).into_string();
        assert!(keypair_from_private_key(&bad).is_err());
    }

    #[test]
    fn test_keypair_from_private_key_invalid_bs58() {
        assert!(keypair_from_private_key("!!!invalid!!!").is_err());
    }
}

pub mod atomic;
pub mod session;
pub mod signing;

use std::future::Future;
use std::pin::Pin;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VenueError};
use crate::rest::VenueHttpClient;
use crate::types::{FillMode, Side};

/// Signing function trait object type.
pub type SignFn =
    dyn Fn(&[u8]) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send>> + Send + Sync;

/// A signed envelope submitted to `/action`: timestamp, nonce, and one
/// typed action body, serialized as JSON and carrying a trailing signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub current_timestamp: i64,
    pub nonce: u32,
    #[serde(flatten)]
    pub kind: ActionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    CreateSession {
        user_pubkey: String,
        session_pubkey: String,
        expiry_timestamp: i64,
    },
    RevokeSession {
        session_id: u64,
    },
    Atomic {
        session_id: u64,
        account_id: u32,
        actions: Vec<AtomicSubaction>,
    },
}

/// An individual subaction within an atomic operation, fully resolved
/// (market decimals already applied, so price/size travel as exact decimals).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AtomicSubaction {
    Place {
        market_id: u32,
        side: Side,
        fill_mode: FillMode,
        is_reduce_only: bool,
        price: Decimal,
        size: Decimal,
        client_order_id: Option<u64>,
    },
    Cancel {
        order_id: u64,
    },
}

/// Response envelope returned from `/action`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub action_id: u64,
    #[serde(flatten)]
    pub kind: Option<ReceiptKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReceiptKind {
    CreateSessionResult { session_id: u64 },
    SessionRevoked,
    Atomic { results: Vec<AtomicSubactionResult> },
    Err { code: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AtomicSubactionResult {
    Placed { order_id: u64 },
    Canceled { order_id: u64 },
    Err { code: u32 },
}

/// Create an action envelope with the given timestamp, nonce, and kind.
pub fn create_action(timestamp: u64, nonce: u32, kind: ActionKind) -> Action {
    Action {
        current_timestamp: timestamp as i64,
        nonce,
        kind,
    }
}

/// Serialize the action as JSON, sign it, and concatenate the signature.
pub async fn prepare_action(action: &Action, sign_fn: &SignFn) -> Result<Vec<u8>> {
    let raw = serde_json::to_vec(action)?;
    let signature = sign_fn(&raw).await?;

    let mut msg = raw;
    msg.extend_from_slice(&signature);
    Ok(msg)
}

/// Send a prepared action to the server and decode the receipt.
pub async fn send_action(
    http_client: &VenueHttpClient,
    action: &Action,
    sign_fn: &SignFn,
) -> Result<Receipt> {
    let payload = prepare_action(action, sign_fn).await?;
    let response_bytes = http_client.post_action(&payload).await?;
    let receipt: Receipt = serde_json::from_slice(&response_bytes)?;
    Ok(receipt)
}

/// Format a receipt error into a human-readable string.
pub fn format_receipt_error(receipt: &Receipt) -> String {
    match &receipt.kind {
        Some(ReceiptKind::Err { code }) => format!("receipt error code {code}"),
        _ => "unknown receipt error".to_string(),
    }
}

/// Assert that a receipt contains the expected kind, or return an error.
pub fn expect_receipt_kind(receipt: &Receipt, expected: &str) -> Result<()> {
    match &receipt.kind {
        Some(ReceiptKind::Err { code }) => Err(VenueError::ReceiptError(format!(
            "expected {expected}, got error code {code}"
        ))),
        Some(_) => Ok(()),
        None => Err(VenueError::ReceiptError(format!(
            "expected {expected}, got empty receipt"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_action_fields() {
        let action = create_action(
            1_700_000_000,
            42,
            ActionKind::RevokeSession { session_id: 7 },
        );
        assert_eq!(action.current_timestamp, 1_700_000_000);
        assert_eq!(action.nonce, 42);
        matches!(action.kind, ActionKind::RevokeSession { session_id: 7 });
    }

    #[test]
    fn test_action_round_trips_through_json() {
        let action = create_action(
            1_000_000,
            7,
            ActionKind::Atomic {
                session_id: 1,
                account_id: 2,
                actions: vec![AtomicSubaction::Cancel { order_id: 99 }],
            },
        );
        let bytes = serde_json::to_vec(&action).unwrap();
        let decoded: Action = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded.current_timestamp, 1_000_000);
        assert_eq!(decoded.nonce, 7);
    }

    #[test]
    fn test_format_receipt_error() {
        let receipt = Receipt {
            action_id: 0,
            kind: Some(ReceiptKind::Err { code: 42 }),
        };
        let msg = format_receipt_error(&receipt);
        assert!(msg.contains("42"));
    }

    #[test]
    fn test_format_receipt_error_unknown() {
        let receipt = Receipt {
            action_id: 0,
            kind: None,
        };
        assert_eq!(format_receipt_error(&receipt), "unknown receipt error");
    }

    #[test]
    fn test_expect_receipt_kind_err() {
        let receipt = Receipt {
            action_id: 0,
            kind: Some(ReceiptKind::Err { code: 1 }),
        };
        let result = expect_receipt_kind(&receipt, "PlaceOrder");
        assert!(result.unwrap_err().to_string().contains("PlaceOrder"));
    }

    #[test]
    fn test_expect_receipt_kind_none() {
        let receipt = Receipt {
            action_id: 0,
            kind: None,
        };
        let result = expect_receipt_kind(&receipt, "Anything");
        assert!(result.unwrap_err().to_string().contains("empty receipt"));
    }
}

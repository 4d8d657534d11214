use crate::error::{Result, VenueError};
use crate::rest::VenueHttpClient;

use super::{create_action, send_action, ActionKind, ReceiptKind, SignFn};

/// Session TTL in microseconds (24 hours).
pub const SESSION_TTL: u64 = 24 * 60 * 60 * 1_000_000;

/// Create a new session on the exchange.
///
/// Returns `(action_id, session_id)`.
pub async fn create_session(
    http_client: &VenueHttpClient,
    sign_fn: &SignFn,
    timestamp: u64,
    nonce: u32,
    user_pubkey: &str,
    session_pubkey: &str,
    expiry_timestamp: Option<u64>,
) -> Result<(u64, u64)> {
    let expiry = expiry_timestamp.unwrap_or(timestamp + SESSION_TTL);

    let kind = ActionKind::CreateSession {
        user_pubkey: user_pubkey.to_string(),
        session_pubkey: session_pubkey.to_string(),
        expiry_timestamp: expiry as i64,
    };

    let action = create_action(timestamp, nonce, kind);
    let receipt = send_action(http_client, &action, sign_fn).await?;

    match receipt.kind {
        Some(ReceiptKind::CreateSessionResult { session_id }) => {
            Ok((receipt.action_id, session_id))
        }
        Some(ReceiptKind::Err { code }) => Err(VenueError::ReceiptError(format!(
            "create session failed: error code {code}"
        ))),
        _ => Err(VenueError::ReceiptError(
            "unexpected receipt for create session".into(),
        )),
    }
}

/// Revoke an existing session.
///
/// Returns the action_id.
pub async fn revoke_session(
    http_client: &VenueHttpClient,
    sign_fn: &SignFn,
    timestamp: u64,
    nonce: u32,
    session_id: u64,
) -> Result<u64> {
    let kind = ActionKind::RevokeSession { session_id };

    let action = create_action(timestamp, nonce, kind);
    let receipt = send_action(http_client, &action, sign_fn).await?;

    match receipt.kind {
        Some(ReceiptKind::SessionRevoked) => Ok(receipt.action_id),
        Some(ReceiptKind::Err { code }) => Err(VenueError::ReceiptError(format!(
            "revoke session failed: error code {code}"
        ))),
        _ => Err(VenueError::ReceiptError(
            "unexpected receipt for revoke session".into(),
        )),
    }
}

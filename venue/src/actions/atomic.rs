use rust_decimal::Decimal;

use crate::error::{Result, VenueError};
use crate::rest::VenueHttpClient;
use crate::types::{FillMode, MarketInfo, Side};
use crate::utils::find_market;

use super::{create_action, send_action, ActionKind, AtomicSubaction, AtomicSubactionResult,
    ReceiptKind, SignFn};

/// User-friendly atomic subaction that gets resolved against known markets
/// before being sent over the wire.
#[derive(Debug, Clone)]
pub enum UserAtomicSubaction {
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

/// Resolve user-friendly subactions into the wire representation, validating
/// that every referenced market exists.
pub fn build_atomic_subactions(
    markets: &[MarketInfo],
    actions: &[UserAtomicSubaction],
) -> Result<Vec<AtomicSubaction>> {
    actions
        .iter()
        .map(|a| match a {
            UserAtomicSubaction::Place {
                market_id,
                side,
                fill_mode,
                is_reduce_only,
                price,
                size,
                client_order_id,
            } => {
                find_market(markets, *market_id)?;
                Ok(AtomicSubaction::Place {
                    market_id: *market_id,
                    side: *side,
                    fill_mode: *fill_mode,
                    is_reduce_only: *is_reduce_only,
                    price: *price,
                    size: *size,
                    client_order_id: *client_order_id,
                })
            }
            UserAtomicSubaction::Cancel { order_id } => Ok(AtomicSubaction::Cancel {
                order_id: *order_id,
            }),
        })
        .collect()
}

/// Execute an atomic operation (up to `MAX_ATOMIC_ACTIONS` place/cancel actions).
pub async fn atomic(
    http_client: &VenueHttpClient,
    sign_fn: &SignFn,
    timestamp: u64,
    nonce: u32,
    session_id: u64,
    account_id: u32,
    markets: &[MarketInfo],
    actions: &[UserAtomicSubaction],
) -> Result<(u64, Vec<AtomicSubactionResult>)> {
    let subactions = build_atomic_subactions(markets, actions)?;

    let kind = ActionKind::Atomic {
        session_id,
        account_id,
        actions: subactions,
    };

    let action = create_action(timestamp, nonce, kind);
    let receipt = send_action(http_client, &action, sign_fn).await?;

    match receipt.kind {
        Some(ReceiptKind::Atomic { results }) => Ok((receipt.action_id, results)),
        Some(ReceiptKind::Err { code }) => Err(VenueError::ReceiptError(format!(
            "atomic failed: error code {code}"
        ))),
        _ => Err(VenueError::ReceiptError(
            "unexpected receipt for atomic".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

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
    fn test_build_cancel_subaction() {
        let actions = vec![UserAtomicSubaction::Cancel { order_id: 12345 }];
        let result = build_atomic_subactions(&sample_markets(), &actions).unwrap();
        assert_eq!(result.len(), 1);
        match &result[0] {
            AtomicSubaction::Cancel { order_id } => assert_eq!(*order_id, 12345),
            other => panic!("expected Cancel, got {other:?}"),
        }
    }

    #[test]
    fn test_build_place_subaction() {
        let actions = vec![UserAtomicSubaction::Place {
            market_id: 1,
            side: Side::Bid,
            fill_mode: FillMode::Limit,
            is_reduce_only: false,
            price: dec!(50000.00),
            size: dec!(0.5),
            client_order_id: Some(99),
        }];
        let result = build_atomic_subactions(&sample_markets(), &actions).unwrap();
        assert_eq!(result.len(), 1);
        match &result[0] {
            AtomicSubaction::Place {
                market_id,
                side,
                price,
                size,
                client_order_id,
                ..
            } => {
                assert_eq!(*market_id, 1);
                assert_eq!(*side, Side::Bid);
                assert_eq!(*price, dec!(50000.00));
                assert_eq!(*size, dec!(0.5));
                assert_eq!(*client_order_id, Some(99));
            }
            other => panic!("expected Place, got {other:?}"),
        }
    }

    #[test]
    fn test_build_place_unknown_market_errors() {
        let actions = vec![UserAtomicSubaction::Place {
            market_id: 99,
            side: Side::Bid,
            fill_mode: FillMode::Limit,
            is_reduce_only: false,
            price: dec!(1),
            size: dec!(1),
            client_order_id: None,
        }];
        let err = build_atomic_subactions(&sample_markets(), &actions).unwrap_err();
        assert!(matches!(err, VenueError::MarketNotFound(99)));
    }

    #[test]
    fn test_build_mixed_cancel_and_place() {
        let actions = vec![
            UserAtomicSubaction::Cancel { order_id: 111 },
            UserAtomicSubaction::Place {
                market_id: 1,
                side: Side::Ask,
                fill_mode: FillMode::ImmediateOrCancel,
                is_reduce_only: false,
                price: dec!(100.00),
                size: dec!(1.0),
                client_order_id: None,
            },
            UserAtomicSubaction::Cancel { order_id: 222 },
        ];
        let result = build_atomic_subactions(&sample_markets(), &actions).unwrap();
        assert_eq!(result.len(), 3);
        assert!(matches!(result[0], AtomicSubaction::Cancel { order_id: 111 }));
        assert!(matches!(result[1], AtomicSubaction::Place { .. }));
        assert!(matches!(result[2], AtomicSubaction::Cancel { order_id: 222 }));
    }

    #[test]
    fn test_build_empty_actions() {
        let result = build_atomic_subactions(&sample_markets(), &[]).unwrap();
        assert!(result.is_empty());
    }
}

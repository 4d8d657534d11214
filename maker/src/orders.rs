//! Atomic order management — diff, cancel, and place in chunks of 4.
//!
//! Compares current active orders against new desired quotes, cancels stale
//! orders and places new ones atomically, ordering each chunk so cancels go
//! out ahead of places.

use rust_decimal::Decimal;
use tracing::{debug, info};
use venue::actions::atomic::UserAtomicSubaction;
use venue::actions::AtomicSubactionResult;
use venue::{FillMode, Side, VenueUser};

use crate::error::MakerError;
use crate::types::Quote;

/// Maximum subactions per atomic call (exchange limit).
const MAX_ATOMIC_ACTIONS: usize = 4;

/// An order whose ID is known (kept from a previous atomic result or sync).
#[derive(Debug, Clone)]
pub struct CachedOrder {
    pub order_id: u64,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Diff `current_orders` against `new_quotes`, cancel stale orders, place new
/// ones, and return the resulting active-order set.
///
/// Orders that already match a quote (same side, price, size) are kept
/// without touching the exchange. Cancels are placed ahead of new places
/// within every chunk so a replace never momentarily doubles exposure.
pub async fn update_quotes(
    user: &VenueUser,
    market_id: u32,
    current_orders: &[CachedOrder],
    new_quotes: &[Quote],
) -> Result<Vec<CachedOrder>, MakerError> {
    let (kept, to_cancel, to_place) = diff_orders(current_orders, new_quotes);

    if to_cancel.is_empty() && to_place.is_empty() {
        return Ok(current_orders.to_vec());
    }

    // Build actions: cancels first, then places.
    let mut actions: Vec<UserAtomicSubaction> =
        Vec::with_capacity(to_cancel.len() + to_place.len());
    for order in &to_cancel {
        actions.push(build_cancel_action(order.order_id));
    }
    for quote in &to_place {
        actions.push(build_place_action(market_id, quote));
    }

    let placed = execute_atomic(user, &actions).await?;

    let mut result = kept;
    result.extend(placed);
    Ok(result)
}

/// Cancel all given orders atomically (in chunks of 4).
pub async fn cancel_orders(user: &VenueUser, orders: &[CachedOrder]) -> Result<(), MakerError> {
    if orders.is_empty() {
        return Ok(());
    }
    let actions: Vec<UserAtomicSubaction> = orders
        .iter()
        .map(|o| build_cancel_action(o.order_id))
        .collect();
    execute_atomic(user, &actions).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Pure diffing logic (unit-testable)
// ---------------------------------------------------------------------------

/// Returns (kept_orders, orders_to_cancel, quotes_to_place).
fn diff_orders<'a>(
    current: &'a [CachedOrder],
    new_quotes: &'a [Quote],
) -> (Vec<CachedOrder>, Vec<&'a CachedOrder>, Vec<&'a Quote>) {
    let mut kept = Vec::new();
    let mut to_place = Vec::new();
    let mut matched_indices = vec![false; current.len()];

    for quote in new_quotes {
        let found = current
            .iter()
            .enumerate()
            .position(|(i, o)| !matched_indices[i] && order_matches_quote(o, quote));
        if let Some(idx) = found {
            matched_indices[idx] = true;
            kept.push(current[idx].clone());
        } else {
            to_place.push(quote);
        }
    }

    let to_cancel: Vec<&CachedOrder> = current
        .iter()
        .enumerate()
        .filter(|(i, _)| !matched_indices[*i])
        .map(|(_, o)| o)
        .collect();

    (kept, to_cancel, to_place)
}

/// Check if an existing order matches a desired quote (same side + price + size).
fn order_matches_quote(order: &CachedOrder, quote: &Quote) -> bool {
    order.side == quote.side && order.price == quote.price && order.size == quote.size
}

// ---------------------------------------------------------------------------
// Action builders
// ---------------------------------------------------------------------------

fn build_place_action(market_id: u32, quote: &Quote) -> UserAtomicSubaction {
    UserAtomicSubaction::Place {
        market_id,
        side: quote.side,
        fill_mode: FillMode::PostOnly,
        is_reduce_only: false,
        price: quote.price,
        size: quote.size,
        client_order_id: None,
    }
}

fn build_cancel_action(order_id: u64) -> UserAtomicSubaction {
    UserAtomicSubaction::Cancel { order_id }
}

// ---------------------------------------------------------------------------
// Atomic execution (chunked)
// ---------------------------------------------------------------------------

/// Execute actions in chunks of [`MAX_ATOMIC_ACTIONS`], returning any placed orders.
async fn execute_atomic(
    user: &VenueUser,
    actions: &[UserAtomicSubaction],
) -> Result<Vec<CachedOrder>, MakerError> {
    if actions.is_empty() {
        return Ok(Vec::new());
    }

    let mut all_placed = Vec::new();
    let total_chunks = actions.len().div_ceil(MAX_ATOMIC_ACTIONS);

    for (chunk_idx, chunk) in actions.chunks(MAX_ATOMIC_ACTIONS).enumerate() {
        info!(
            chunk = chunk_idx + 1,
            total = total_chunks,
            actions = format_actions(chunk),
            "ATOMIC"
        );

        let result = user.atomic(chunk, None).await?;
        let placed = extract_placed_orders(&result.results, chunk);

        if !placed.is_empty() {
            debug!(
                ids = ?placed.iter().map(|o| o.order_id).collect::<Vec<_>>(),
                "placed orders"
            );
        }
        all_placed.extend(placed);
    }

    Ok(all_placed)
}

/// Extract placed orders from atomic results, pairing each `Placed` result
/// with its corresponding `Place` action (by position) to recover
/// side/price/size, which the receipt itself doesn't carry.
fn extract_placed_orders(
    results: &[AtomicSubactionResult],
    actions: &[UserAtomicSubaction],
) -> Vec<CachedOrder> {
    let place_actions: Vec<&UserAtomicSubaction> = actions
        .iter()
        .filter(|a| matches!(a, UserAtomicSubaction::Place { .. }))
        .collect();

    let mut orders = Vec::new();
    let mut place_idx = 0;

    for r in results {
        if let AtomicSubactionResult::Placed { order_id } = r {
            if let Some(UserAtomicSubaction::Place {
                side, price, size, ..
            }) = place_actions.get(place_idx).copied()
            {
                orders.push(CachedOrder {
                    order_id: *order_id,
                    side: *side,
                    price: *price,
                    size: *size,
                });
            }
            place_idx += 1;
        }
    }

    orders
}

/// Format actions for logging.
fn format_actions(actions: &[UserAtomicSubaction]) -> String {
    actions
        .iter()
        .map(|a| match a {
            UserAtomicSubaction::Cancel { order_id } => format!("X{order_id}"),
            UserAtomicSubaction::Place {
                side,
                price,
                size,
                fill_mode,
                is_reduce_only,
                ..
            } => {
                let s = match side {
                    Side::Bid => "B",
                    Side::Ask => "A",
                };
                let ro = if *is_reduce_only { "RO" } else { "" };
                let fm = match fill_mode {
                    FillMode::PostOnly => "PO",
                    FillMode::Limit => "LIM",
                    FillMode::ImmediateOrCancel => "IOC",
                    FillMode::FillOrKill => "FOK",
                };
                format!("{s}{ro}[{fm}]@{price}x{size}")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Testable helpers for the pure diff logic
// ---------------------------------------------------------------------------

/// Simplified diff for testing: returns (n_kept, n_cancel, n_place).
#[cfg(test)]
fn diff_counts(current: &[CachedOrder], new_quotes: &[Quote]) -> (usize, usize, usize) {
    let (kept, cancel, place) = diff_orders(current, new_quotes);
    (kept.len(), cancel.len(), place.len())
}

//! Re-quote guard: suppress replacing a live order that's close enough, or
//! too fresh, to bother cancelling.
//!
//! Scoped to the orchestrator alongside [`OrderAgeMap`], which tracks how
//! long each live order has been resting so the guard can enforce
//! `min_order_age_ms`.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::orders::CachedOrder;
use crate::types::Quote;

/// Tracks `first_seen_ms` for every currently-live order id.
///
/// Entries are created the first time an order id appears live and removed
/// once it's no longer in the live set — callers drive this via
/// [`OrderAgeMap::sync`] after every successful order-book reconcile.
#[derive(Debug, Default)]
pub struct OrderAgeMap {
    first_seen_ms: HashMap<u64, u64>,
}

impl OrderAgeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `order_id` as live at `now_ms` if it isn't tracked yet.
    pub fn observe(&mut self, order_id: u64, now_ms: u64) {
        self.first_seen_ms.entry(order_id).or_insert(now_ms);
    }

    /// Prune entries whose order id is no longer live.
    pub fn prune(&mut self, live_ids: &[u64]) {
        let live: std::collections::HashSet<u64> = live_ids.iter().copied().collect();
        self.first_seen_ms.retain(|id, _| live.contains(id));
    }

    /// Age in milliseconds of `order_id`, or `None` if untracked.
    pub fn age_ms(&self, order_id: u64, now_ms: u64) -> Option<u64> {
        self.first_seen_ms
            .get(&order_id)
            .map(|&seen| now_ms.saturating_sub(seen))
    }

    /// Sync the map against the current live order set: observe every live
    /// id at `now_ms`, then prune anything that fell off.
    pub fn sync(&mut self, live_orders: &[CachedOrder], now_ms: u64) {
        for order in live_orders {
            self.observe(order.order_id, now_ms);
        }
        let live_ids: Vec<u64> = live_orders.iter().map(|o| o.order_id).collect();
        self.prune(&live_ids);
    }
}

/// Basis-point price difference between two prices, relative to their
/// average. Matches `diff_bps = |a - b| / ((|a|+|b|)/2) * 10_000`.
fn diff_bps(a: Decimal, b: Decimal) -> Decimal {
    let denom = (a.abs() + b.abs()) / Decimal::from(2);
    if denom.is_zero() {
        return Decimal::ZERO;
    }
    (a - b).abs() / denom * Decimal::from(10_000)
}

/// Replace a proposed quote with a live order's price/size when the order
/// is too fresh or too close to bother replacing.
pub struct RequoteGuard {
    pub requote_threshold_bps: Decimal,
    pub min_order_age_ms: u64,
}

impl RequoteGuard {
    pub fn new(requote_threshold_bps: f64, min_order_age_ms: u64) -> Self {
        Self {
            requote_threshold_bps: Decimal::from_f64_retain(requote_threshold_bps)
                .unwrap_or_default(),
            min_order_age_ms,
        }
    }

    /// Filter proposed quotes against the live order set and age map.
    pub fn filter(
        &self,
        new_quotes: &[Quote],
        live_orders: &[CachedOrder],
        ages: &OrderAgeMap,
        now_ms: u64,
    ) -> Vec<Quote> {
        new_quotes
            .iter()
            .map(|quote| {
                let live = live_orders.iter().find(|o| o.side == quote.side);
                match live {
                    Some(live) => {
                        let age_ms = ages.age_ms(live.order_id, now_ms).unwrap_or(0);
                        let diff = diff_bps(live.price, quote.price);
                        if age_ms < self.min_order_age_ms || diff <= self.requote_threshold_bps {
                            Quote {
                                side: live.side,
                                price: live.price,
                                size: live.size,
                            }
                        } else {
                            quote.clone()
                        }
                    }
                    None => quote.clone(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use venue::Side;

    fn cached(id: u64, side: Side, price: Decimal, size: Decimal) -> CachedOrder {
        CachedOrder {
            order_id: id,
            side,
            price,
            size,
        }
    }

    fn quote(side: Side, price: Decimal, size: Decimal) -> Quote {
        Quote { side, price, size }
    }

    #[test]
    fn test_no_live_order_leaves_quote_unchanged() {
        let guard = RequoteGuard::new(3.0, 10_000);
        let ages = OrderAgeMap::new();
        let quotes = vec![quote(Side::Bid, dec!(100), dec!(1))];
        let result = guard.filter(&quotes, &[], &ages, 0);
        assert_eq!(result[0].price, dec!(100));
    }

    #[test]
    fn test_fresh_order_is_kept_regardless_of_price_diff() {
        let guard = RequoteGuard::new(3.0, 10_000);
        let mut ages = OrderAgeMap::new();
        ages.observe(1, 0);
        let live = vec![cached(1, Side::Bid, dec!(99900), dec!(0.001))];
        let quotes = vec![quote(Side::Bid, dec!(99901), dec!(0.001))];
        // age = 2000ms < min_order_age_ms(10000) → kept even though diff is tiny
        let result = guard.filter(&quotes, &live, &ages, 2_000);
        assert_eq!(result[0].price, dec!(99900));
        assert_eq!(result[0].size, dec!(0.001));
    }

    #[test]
    fn test_small_diff_within_threshold_is_kept() {
        let guard = RequoteGuard::new(3.0, 0);
        let mut ages = OrderAgeMap::new();
        ages.observe(1, 0);
        let live = vec![cached(1, Side::Bid, dec!(100000), dec!(1))];
        // diff_bps = |100000-100002| / 100001 * 10000 ≈ 0.2bps ≤ 3bps
        let quotes = vec![quote(Side::Bid, dec!(100002), dec!(1))];
        let result = guard.filter(&quotes, &live, &ages, 100_000);
        assert_eq!(result[0].price, dec!(100000));
    }

    #[test]
    fn test_large_diff_past_threshold_and_age_lets_proposal_stand() {
        let guard = RequoteGuard::new(3.0, 0);
        let mut ages = OrderAgeMap::new();
        ages.observe(1, 0);
        let live = vec![cached(1, Side::Bid, dec!(99000), dec!(1))];
        let quotes = vec![quote(Side::Bid, dec!(100000), dec!(1))];
        let result = guard.filter(&quotes, &live, &ages, 100_000);
        assert_eq!(result[0].price, dec!(100000));
    }

    #[test]
    fn test_order_age_map_sync_prunes_dead_orders() {
        let mut ages = OrderAgeMap::new();
        let live = vec![cached(1, Side::Bid, dec!(100), dec!(1))];
        ages.sync(&live, 0);
        assert!(ages.age_ms(1, 0).is_some());
        ages.sync(&[], 1_000);
        assert!(ages.age_ms(1, 1_000).is_none());
    }

    #[test]
    fn test_order_age_map_preserves_first_seen_across_syncs() {
        let mut ages = OrderAgeMap::new();
        let live = vec![cached(1, Side::Bid, dec!(100), dec!(1))];
        ages.sync(&live, 0);
        ages.sync(&live, 5_000);
        assert_eq!(ages.age_ms(1, 5_000), Some(5_000));
    }

    #[test]
    fn test_guard_monotonicity_lower_threshold_increases_replacement_rate() {
        let mut ages = OrderAgeMap::new();
        ages.observe(1, 0);
        let live = vec![cached(1, Side::Bid, dec!(100000), dec!(1))];
        let quotes = vec![quote(Side::Bid, dec!(100010), dec!(1))];
        // diff ≈ 1bps
        let strict = RequoteGuard::new(0.5, 0).filter(&quotes, &live, &ages, 100_000);
        let loose = RequoteGuard::new(5.0, 0).filter(&quotes, &live, &ages, 100_000);
        // Strict (low threshold) lets the proposal stand (replace); loose keeps live.
        assert_eq!(strict[0].price, dec!(100010));
        assert_eq!(loose[0].price, dec!(100000));
    }
}

//! Reference-venue price feeds.
//!
//! A reference feed is a capability — `connect`, `close`, `latest`,
//! `subscribe_price` — rather than a fixed concrete type. The orchestrator
//! holds one behind `Box<dyn ReferenceFeed>` and swaps the instance on
//! failover without touching any call site.

pub mod binance;
pub mod coinbase;
pub mod none;

use tokio::sync::watch;

pub use binance::BinanceFeed;
pub use coinbase::CoinbaseFeed;
pub use none::NoneFeed;

/// Common interface implemented by every reference-price source.
pub trait ReferenceFeed: Send + Sync {
    /// Start the background connection (idempotent no-op for degenerate feeds).
    fn connect(&self);

    /// Tear down the background connection.
    fn close(&self);

    /// Latest mid-price snapshot, if any has arrived yet.
    fn latest(&self) -> Option<venue::MidPrice>;

    /// Subscribe to price updates.
    fn subscribe_price(&self) -> watch::Receiver<Option<venue::MidPrice>>;

    /// Human-readable name for logging (e.g. `"binance"`).
    fn name(&self) -> &'static str;
}

/// Which concrete reference feed to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceFeedKind {
    Binance,
    Coinbase,
    None,
}

impl ReferenceFeedKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "binance" => Some(Self::Binance),
            "coinbase" => Some(Self::Coinbase),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// Build the feed fallback order: `primary` first, the other real feed
/// second, and the degenerate `none` feed last. If `primary` is already
/// `none`, the list is just `[none]`.
pub fn priority_order(primary: ReferenceFeedKind) -> Vec<ReferenceFeedKind> {
    use ReferenceFeedKind::*;
    match primary {
        Binance => vec![Binance, Coinbase, None],
        Coinbase => vec![Coinbase, Binance, None],
        None => vec![None],
    }
}

/// Construct the feed for `kind`, subscribed to `market_symbol` (an exchange
/// symbol such as `"BTC-PERP"`, translated per-venue as needed).
pub fn build_feed(kind: ReferenceFeedKind, market_symbol: &str) -> Box<dyn ReferenceFeed> {
    match kind {
        ReferenceFeedKind::Binance => Box::new(BinanceFeed::new(&derive_binance_symbol(market_symbol))),
        ReferenceFeedKind::Coinbase => {
            Box::new(CoinbaseFeed::new(&derive_coinbase_symbol(market_symbol)))
        }
        ReferenceFeedKind::None => Box::new(NoneFeed::new()),
    }
}

/// Derive Binance Futures symbol from an exchange market symbol.
///
/// `"BTC-PERP"` → `"btcusdt"`, `"ETH-PERP"` → `"ethusdt"`.
pub fn derive_binance_symbol(market_symbol: &str) -> String {
    let base = market_symbol
        .split('-')
        .next()
        .unwrap_or(market_symbol)
        .to_lowercase()
        .replace("usd", "");
    format!("{base}usdt")
}

/// Derive a Coinbase Exchange product id from an exchange market symbol.
///
/// `"BTC-PERP"` → `"BTC-USD"`.
pub fn derive_coinbase_symbol(market_symbol: &str) -> String {
    let base = market_symbol
        .split('-')
        .next()
        .unwrap_or(market_symbol)
        .to_uppercase()
        .replace("USD", "");
    format!("{base}-USD")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_binance_symbol() {
        assert_eq!(derive_binance_symbol("BTC-PERP"), "btcusdt");
        assert_eq!(derive_binance_symbol("ETH-PERP"), "ethusdt");
        assert_eq!(derive_binance_symbol("SOL-PERP"), "solusdt");
        assert_eq!(derive_binance_symbol("DOGE-PERP"), "dogeusdt");
    }

    #[test]
    fn test_derive_coinbase_symbol() {
        assert_eq!(derive_coinbase_symbol("BTC-PERP"), "BTC-USD");
        assert_eq!(derive_coinbase_symbol("ETH-PERP"), "ETH-USD");
    }

    #[test]
    fn test_priority_order_binance_primary() {
        let order = priority_order(ReferenceFeedKind::Binance);
        assert_eq!(
            order,
            vec![
                ReferenceFeedKind::Binance,
                ReferenceFeedKind::Coinbase,
                ReferenceFeedKind::None
            ]
        );
    }

    #[test]
    fn test_priority_order_coinbase_primary() {
        let order = priority_order(ReferenceFeedKind::Coinbase);
        assert_eq!(
            order,
            vec![
                ReferenceFeedKind::Coinbase,
                ReferenceFeedKind::Binance,
                ReferenceFeedKind::None
            ]
        );
    }

    #[test]
    fn test_priority_order_none_primary_is_singleton() {
        assert_eq!(
            priority_order(ReferenceFeedKind::None),
            vec![ReferenceFeedKind::None]
        );
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(
            ReferenceFeedKind::parse("Binance"),
            Some(ReferenceFeedKind::Binance)
        );
        assert_eq!(
            ReferenceFeedKind::parse("COINBASE"),
            Some(ReferenceFeedKind::Coinbase)
        );
        assert_eq!(ReferenceFeedKind::parse("none"), Some(ReferenceFeedKind::None));
        assert_eq!(ReferenceFeedKind::parse("bogus"), None);
    }
}

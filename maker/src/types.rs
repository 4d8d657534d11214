use rust_decimal::Decimal;
use serde::Deserialize;

/// Binance combined stream envelope: `{"stream":"btcusdt@bookTicker","data":{...}}`
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct CombinedStreamMsg {
    pub stream: String,
    pub data: BookTickerMsg,
}

/// Binance bookTicker payload.
///
/// Field names match the Binance API:
///   e  = event type
///   E  = event time (ms)
///   T  = transaction time (ms)
///   s  = symbol
///   b  = best bid price (string)
///   B  = best bid qty (string)
///   a  = best ask price (string)
///   A  = best ask qty (string)
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct BookTickerMsg {
    #[serde(default)]
    pub e: String,
    #[serde(default)]
    #[serde(rename = "E")]
    pub event_time: u64,
    #[serde(default)]
    #[serde(rename = "T")]
    pub transaction_time: u64,
    pub s: String,
    pub b: String,
    #[serde(rename = "B")]
    pub bid_qty: String,
    pub a: String,
    #[serde(rename = "A")]
    pub ask_qty: String,
}

/// Coinbase Exchange `ticker` channel payload.
///
/// Coinbase's ticker channel doesn't carry a best-bid/best-ask pair the way
/// Binance's bookTicker does; `best_bid`/`best_ask` are updated on every
/// book change and are close enough to top-of-book for a reference mid.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct CoinbaseTickerMsg {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub product_id: String,
    pub best_bid: String,
    pub best_ask: String,
}

/// A quote for order placement with side, price, and size.
#[derive(Debug, Clone)]
pub struct Quote {
    pub side: venue::Side,
    pub price: Decimal,
    pub size: Decimal,
}

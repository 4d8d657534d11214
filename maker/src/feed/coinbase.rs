//! Coinbase Exchange WebSocket price feed.
//!
//! Same shape as [`super::binance::BinanceFeed`]: a background task publishes
//! [`venue::MidPrice`] via a `watch` channel, with the same heartbeat and
//! staleness policy. Coinbase's `ticker` channel requires an explicit
//! subscribe message rather than encoding the product in the URL path.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::MakerError;
use crate::types::CoinbaseTickerMsg;

use super::ReferenceFeed;

const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(10);
const STALE_THRESHOLD: Duration = Duration::from_secs(60);
const STALE_CHECK_INTERVAL: Duration = Duration::from_secs(10);
const RECONNECT_DELAY: Duration = Duration::from_secs(3);
const COINBASE_WS: &str = "wss://ws-feed.exchange.coinbase.com";

/// Live Coinbase Exchange mid-price feed.
pub struct CoinbaseFeed {
    price_tx: watch::Sender<Option<venue::MidPrice>>,
    price_rx: watch::Receiver<Option<venue::MidPrice>>,
    cancel: CancellationToken,
    product_id: String,
}

impl CoinbaseFeed {
    /// Create a new feed for the given product id (e.g. `"BTC-USD"`).
    ///
    /// Does **not** connect yet — call [`connect`](ReferenceFeed::connect).
    pub fn new(product_id: &str) -> Self {
        let (price_tx, price_rx) = watch::channel(None);
        Self {
            price_tx,
            price_rx,
            cancel: CancellationToken::new(),
            product_id: product_id.to_string(),
        }
    }
}

impl ReferenceFeed for CoinbaseFeed {
    fn connect(&self) {
        let product_id = self.product_id.clone();
        let tx = self.price_tx.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            info!(product_id = %product_id, "coinbase feed starting");
            loop {
                match run_price_connection(&product_id, &tx, &cancel).await {
                    Ok(()) => {
                        info!("coinbase feed stopped gracefully");
                        return;
                    }
                    Err(e) => {
                        error!(error = %e, "coinbase connection error");
                        if cancel.is_cancelled() {
                            return;
                        }
                        info!(delay = ?RECONNECT_DELAY, "reconnecting coinbase");
                        tokio::select! {
                            _ = time::sleep(RECONNECT_DELAY) => {}
                            _ = cancel.cancelled() => return,
                        }
                    }
                }
            }
        });
    }

    fn close(&self) {
        self.cancel.cancel();
    }

    fn latest(&self) -> Option<venue::MidPrice> {
        *self.price_rx.borrow()
    }

    fn subscribe_price(&self) -> watch::Receiver<Option<venue::MidPrice>> {
        self.price_rx.clone()
    }

    fn name(&self) -> &'static str {
        "coinbase"
    }
}

async fn run_price_connection(
    product_id: &str,
    tx: &watch::Sender<Option<venue::MidPrice>>,
    cancel: &CancellationToken,
) -> Result<(), MakerError> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(COINBASE_WS).await?;
    let (mut sink, mut stream) = ws_stream.split();

    let subscribe = json!({
        "type": "subscribe",
        "product_ids": [product_id],
        "channels": ["ticker"],
    });
    sink.send(Message::Text(subscribe.to_string())).await?;
    info!(product_id, "coinbase connected");

    let mut last_message_time = Instant::now();
    let mut ping_interval = time::interval(PING_INTERVAL);
    ping_interval.tick().await;
    let mut stale_interval = time::interval(STALE_CHECK_INTERVAL);
    stale_interval.tick().await;
    let mut pong_deadline: Option<Instant> = None;

    loop {
        let pong_timeout_fut = match pong_deadline {
            Some(d) => tokio::time::sleep_until(d),
            None => tokio::time::sleep_until(Instant::now() + Duration::from_secs(86400)),
        };
        let pong_active = pong_deadline.is_some();

        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_message_time = Instant::now();
                        if let Some(mid) = parse_ticker(&text) {
                            let _ = tx.send(Some(mid));
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        last_message_time = Instant::now();
                        sink.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_message_time = Instant::now();
                        pong_deadline = None;
                    }
                    Some(Ok(Message::Close(_))) => return Err(MakerError::ConnectionClosed),
                    Some(Ok(_)) => { last_message_time = Instant::now(); }
                    Some(Err(e)) => return Err(MakerError::WebSocket(e)),
                    None => return Err(MakerError::ConnectionClosed),
                }
            }
            _ = ping_interval.tick() => {
                sink.send(Message::Ping(vec![])).await?;
                pong_deadline = Some(Instant::now() + PONG_TIMEOUT);
            }
            _ = stale_interval.tick() => {
                let elapsed = last_message_time.elapsed();
                if elapsed > STALE_THRESHOLD {
                    return Err(MakerError::StaleConnection(elapsed.as_millis() as u64));
                }
            }
            _ = pong_timeout_fut, if pong_active => {
                return Err(MakerError::PongTimeout);
            }
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return Ok(());
            }
        }
    }
}

/// Parse a Coinbase `ticker` message into a [`venue::MidPrice`].
///
/// Returns `None` on parse failure or for non-ticker messages (e.g. the
/// `subscriptions` ack) — not fatal.
fn parse_ticker(text: &str) -> Option<venue::MidPrice> {
    let msg: CoinbaseTickerMsg = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            debug!(error = %e, "failed to parse coinbase ticker");
            return None;
        }
    };
    if msg.msg_type != "ticker" {
        return None;
    }
    let bid: f64 = msg.best_bid.parse().ok()?;
    let ask: f64 = msg.best_ask.parse().ok()?;
    let mid = (bid + ask) * 0.5;
    let timestamp = epoch_ms();
    Some(venue::MidPrice {
        mid,
        bid,
        ask,
        timestamp,
    })
}

fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ticker_to_mid_price() {
        let json = r#"{"type":"ticker","product_id":"BTC-USD","best_bid":"50000.00","best_ask":"50010.00"}"#;
        let mid = parse_ticker(json).unwrap();
        assert!((mid.bid - 50000.0).abs() < 1e-6);
        assert!((mid.ask - 50010.0).abs() < 1e-6);
        assert!((mid.mid - 50005.0).abs() < 1e-6);
    }

    #[test]
    fn test_non_ticker_message_ignored() {
        let json = r#"{"type":"subscriptions","channels":[]}"#;
        assert!(parse_ticker(json).is_none());
    }

    #[test]
    fn test_parse_invalid_json_returns_none() {
        assert!(parse_ticker("not json").is_none());
    }
}

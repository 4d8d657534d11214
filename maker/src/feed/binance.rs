//! Binance Futures WebSocket price feed.
//!
//! Publishes [`venue::MidPrice`] via a `watch` channel for consumption by
//! the market maker. Auto-reconnects with a fixed backoff and force-closes
//! on heartbeat or staleness timeout.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::MakerError;
use crate::types::BookTickerMsg;

use super::ReferenceFeed;

const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(10);
const STALE_THRESHOLD: Duration = Duration::from_secs(60);
const STALE_CHECK_INTERVAL: Duration = Duration::from_secs(10);
const RECONNECT_DELAY: Duration = Duration::from_secs(3);
const BINANCE_FUTURES_WS: &str = "wss://fstream.binance.com/ws";

/// Live Binance Futures mid-price feed.
pub struct BinanceFeed {
    price_tx: watch::Sender<Option<venue::MidPrice>>,
    price_rx: watch::Receiver<Option<venue::MidPrice>>,
    cancel: CancellationToken,
    ws_url: String,
}

impl BinanceFeed {
    /// Create a new feed for the given lowercase symbol (e.g. `"btcusdt"`).
    ///
    /// Does **not** connect yet — call [`connect`](ReferenceFeed::connect).
    pub fn new(symbol: &str) -> Self {
        let (price_tx, price_rx) = watch::channel(None);
        let ws_url = format!("{BINANCE_FUTURES_WS}/{symbol}@bookTicker");
        Self {
            price_tx,
            price_rx,
            cancel: CancellationToken::new(),
            ws_url,
        }
    }
}

impl ReferenceFeed for BinanceFeed {
    fn connect(&self) {
        let url = self.ws_url.clone();
        let tx = self.price_tx.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            info!(url = %url, "binance feed starting");
            loop {
                match run_price_connection(&url, &tx, &cancel).await {
                    Ok(()) => {
                        info!("binance feed stopped gracefully");
                        return;
                    }
                    Err(e) => {
                        error!(error = %e, "binance connection error");
                        if cancel.is_cancelled() {
                            return;
                        }
                        info!(delay = ?RECONNECT_DELAY, "reconnecting binance");
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
        "binance"
    }
}

/// Single WebSocket connection that parses book tickers into [`venue::MidPrice`].
async fn run_price_connection(
    url: &str,
    tx: &watch::Sender<Option<venue::MidPrice>>,
    cancel: &CancellationToken,
) -> Result<(), MakerError> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(url).await?;
    let (mut sink, mut stream) = ws_stream.split();
    info!("binance connected");

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
                        if let Some(mid) = parse_book_ticker(&text) {
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

/// Parse a Binance bookTicker JSON into a [`venue::MidPrice`].
///
/// Returns `None` on parse failure (logged at debug level, not fatal).
fn parse_book_ticker(text: &str) -> Option<venue::MidPrice> {
    let msg: BookTickerMsg = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            debug!(error = %e, "failed to parse book ticker");
            return None;
        }
    };
    let bid: f64 = msg.b.parse().ok()?;
    let ask: f64 = msg.a.parse().ok()?;
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
    fn test_parse_book_ticker_to_mid_price() {
        let json = r#"{"s":"BTCUSDT","b":"50000.00","a":"50010.00","B":"1.5","A":"2.0"}"#;
        let mid = parse_book_ticker(json).unwrap();
        assert!((mid.bid - 50000.0).abs() < 1e-6);
        assert!((mid.ask - 50010.0).abs() < 1e-6);
        assert!((mid.mid - 50005.0).abs() < 1e-6);
        assert!(mid.timestamp > 0);
    }

    #[test]
    fn test_mid_price_calculation() {
        let json = r#"{"s":"ETHUSDT","b":"3000.50","a":"3001.50","B":"10","A":"10"}"#;
        let mid = parse_book_ticker(json).unwrap();
        assert!((mid.mid - 3001.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_invalid_json_returns_none() {
        assert!(parse_book_ticker("not json").is_none());
    }

    #[test]
    fn test_parse_missing_fields_returns_none() {
        let json = r#"{"s":"BTCUSDT","b":"invalid","a":"50010.00"}"#;
        assert!(parse_book_ticker(json).is_none());
    }
}

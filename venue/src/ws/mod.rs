pub mod events;
pub mod subscriber;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::VenueError;

use events::*;

/// WebSocket client for the exchange's local orderbook delta and account feeds.
///
/// Manages a persistent connection with auto-reconnect and heartbeat.
/// Dispatches typed messages via broadcast channels.
#[derive(Debug)]
pub struct VenueWebSocketClient {
    url: String,
    delta_tx: broadcast::Sender<WebSocketDeltaUpdate>,
    account_tx: broadcast::Sender<WebSocketAccountUpdate>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl VenueWebSocketClient {
    /// Create a new WebSocket client (does not connect yet).
    pub fn new(url: String) -> Self {
        let (delta_tx, _) = broadcast::channel(256);
        let (account_tx, _) = broadcast::channel(256);

        Self {
            url,
            delta_tx,
            account_tx,
            shutdown_tx: None,
        }
    }

    /// Subscribe to delta (orderbook) updates.
    pub fn subscribe_deltas(&self) -> broadcast::Receiver<WebSocketDeltaUpdate> {
        self.delta_tx.subscribe()
    }

    /// Subscribe to account updates.
    pub fn subscribe_accounts(&self) -> broadcast::Receiver<WebSocketAccountUpdate> {
        self.account_tx.subscribe()
    }

    /// Connect and start processing messages in the background.
    pub fn connect(&mut self) {
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let url = self.url.clone();
        let delta_tx = self.delta_tx.clone();
        let account_tx = self.account_tx.clone();

        tokio::spawn(async move {
            let mut shutdown_rx = shutdown_rx;
            loop {
                match Self::run_connection(&url, &delta_tx, &account_tx, &mut shutdown_rx).await {
                    Ok(()) => {
                        info!("WebSocket connection closed gracefully");
                        break;
                    }
                    Err(e) => {
                        warn!("WebSocket connection error: {e}, reconnecting in 3s...");
                        tokio::time::sleep(Duration::from_secs(3)).await;
                    }
                }
            }
        });
    }

    async fn run_connection(
        url: &str,
        delta_tx: &broadcast::Sender<WebSocketDeltaUpdate>,
        account_tx: &broadcast::Sender<WebSocketAccountUpdate>,
        shutdown_rx: &mut tokio::sync::oneshot::Receiver<()>,
    ) -> std::result::Result<(), VenueError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| VenueError::WebSocket(format!("connect failed: {e}")))?;

        info!("WebSocket connected to {url}");

        let (mut write, mut read) = ws_stream.split();

        let mut ping_interval = tokio::time::interval(Duration::from_secs(30));
        let mut pong_timeout: Option<tokio::time::Instant> = None;

        loop {
            tokio::select! {
                _ = &mut *shutdown_rx => {
                    debug!("WebSocket shutdown requested");
                    let _ = write.close().await;
                    return Ok(());
                }
                _ = ping_interval.tick() => {
                    if let Some(deadline) = pong_timeout {
                        if tokio::time::Instant::now() > deadline {
                            return Err(VenueError::WebSocket("pong timeout".into()));
                        }
                    }
                    let _ = write.send(Message::Ping(vec![])).await;
                    pong_timeout = Some(tokio::time::Instant::now() + Duration::from_secs(10));
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            Self::dispatch_message(&text, delta_tx, account_tx);
                        }
                        Some(Ok(Message::Pong(_))) => {
                            pong_timeout = None;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            return Err(VenueError::WebSocket("server closed connection".into()));
                        }
                        Some(Err(e)) => {
                            return Err(VenueError::WebSocket(format!("read error: {e}")));
                        }
                        None => {
                            return Err(VenueError::WebSocket("stream ended".into()));
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    fn dispatch_message(
        text: &str,
        delta_tx: &broadcast::Sender<WebSocketDeltaUpdate>,
        account_tx: &broadcast::Sender<WebSocketAccountUpdate>,
    ) {
        // Wrapped messages: { "delta": ... }, { "account": ... }
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
            if let Some(delta) = value.get("delta") {
                if let Ok(update) = serde_json::from_value::<WebSocketDeltaUpdate>(delta.clone()) {
                    let _ = delta_tx.send(update);
                    return;
                }
            }
            if let Some(account) = value.get("account") {
                if let Ok(update) =
                    serde_json::from_value::<WebSocketAccountUpdate>(account.clone())
                {
                    let _ = account_tx.send(update);
                    return;
                }
            }

            debug!("unrecognized WebSocket message: {text}");
        } else {
            error!("failed to parse WebSocket message as JSON: {text}");
        }
    }

    /// Close the WebSocket connection.
    pub fn close(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

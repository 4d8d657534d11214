use std::collections::HashMap;

use crate::config::VenueConfig;
use crate::error::{Result, VenueError};
use crate::rest::VenueHttpClient;
use crate::types::*;
use crate::ws::VenueWebSocketClient;

/// Main client for interacting with the exchange.
#[derive(Debug, Clone)]
pub struct Venue {
    /// Base URL for the venue's web server.
    pub web_server_url: String,
    /// HTTP client.
    pub http_client: VenueHttpClient,
    /// Available markets.
    pub markets: Vec<MarketInfo>,
    /// Available tokens.
    pub tokens: Vec<TokenInfo>,
    /// Symbol -> market_id mapping.
    symbol_to_market_id: HashMap<String, u32>,
}

impl Venue {
    /// Create and initialize a new client.
    pub async fn new(config: VenueConfig) -> Result<Self> {
        let http_client = VenueHttpClient::new(&config.web_server_url);

        let info = http_client.get_info().await?;

        let mut symbol_to_market_id = HashMap::new();
        for market in &info.markets {
            symbol_to_market_id.insert(market.symbol.clone(), market.market_id);
        }

        Ok(Self {
            web_server_url: config.web_server_url,
            http_client,
            markets: info.markets,
            tokens: info.tokens,
            symbol_to_market_id,
        })
    }

    /// Refresh market/token info from the server.
    pub async fn fetch_info(&mut self) -> Result<()> {
        let info = self.http_client.get_info().await?;
        self.symbol_to_market_id.clear();
        for market in &info.markets {
            self.symbol_to_market_id
                .insert(market.symbol.clone(), market.market_id);
        }
        self.markets = info.markets;
        self.tokens = info.tokens;
        Ok(())
    }

    /// Resolve a market symbol to its ID.
    pub fn resolve_market_id(&self, symbol: &str) -> Result<u32> {
        self.symbol_to_market_id
            .get(symbol)
            .copied()
            .ok_or_else(|| VenueError::MarketNotFound(0))
    }

    /// Find a market by ID.
    pub fn find_market(&self, market_id: u32) -> Result<&MarketInfo> {
        crate::utils::find_market(&self.markets, market_id)
    }

    // --- REST delegates ---

    /// Get the current server timestamp.
    pub async fn get_timestamp(&self) -> Result<u64> {
        self.http_client.get_timestamp().await
    }

    /// Get user information by public key.
    pub async fn get_user(&self, pubkey: &str) -> Result<User> {
        self.http_client.get_user(pubkey).await
    }

    /// Get full account state by account ID.
    pub async fn get_account(&self, account_id: u32) -> Result<Account> {
        self.http_client.get_account(account_id).await
    }

    /// Get the orderbook for a market by symbol name.
    pub async fn get_orderbook_by_symbol(&self, symbol: &str) -> Result<OrderbookInfo> {
        let market_id = self.resolve_market_id(symbol)?;
        self.http_client.get_orderbook(market_id).await
    }

    /// Get the orderbook for a market by ID.
    pub async fn get_orderbook(&self, market_id: u32) -> Result<OrderbookInfo> {
        self.http_client.get_orderbook(market_id).await
    }

    /// Get exchange-wide markets and tokens configuration.
    pub async fn get_info(&self) -> Result<MarketsInfo> {
        self.http_client.get_info().await
    }

    // --- WebSocket ---

    /// Create a WebSocket client subscribed to local orderbook deltas and
    /// account updates for the given symbols/accounts.
    pub fn create_websocket_client(
        &self,
        deltas: &[String],
        accounts: &[u32],
    ) -> VenueWebSocketClient {
        let mut streams = Vec::new();

        for symbol in deltas {
            streams.push(format!("deltas@{symbol}"));
        }
        for account_id in accounts {
            streams.push(format!("account@{account_id}"));
        }

        let ws_url = format!(
            "{}/ws/{}",
            self.web_server_url
                .replace("https://", "wss://")
                .replace("http://", "ws://"),
            streams.join("&")
        );

        VenueWebSocketClient::new(ws_url)
    }
}

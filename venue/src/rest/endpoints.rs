use crate::error::Result;
use crate::rest::VenueHttpClient;
use crate::types::*;

impl VenueHttpClient {
    // --- Market Info ---

    /// GET /info - List of markets and tokens.
    pub async fn get_info(&self) -> Result<MarketsInfo> {
        self.get("/info", &[]).await
    }

    /// GET /timestamp - Current logical timestamp of the engine.
    pub async fn get_timestamp(&self) -> Result<u64> {
        self.get("/timestamp", &[]).await
    }

    // --- User ---

    /// GET /user/{pubkey} - List account IDs and sessions for a user.
    pub async fn get_user(&self, pubkey: &str) -> Result<User> {
        self.get(&format!("/user/{pubkey}"), &[]).await
    }

    // --- Account ---

    /// GET /account/{account_id} - Account summary (balances, positions, orders).
    pub async fn get_account(&self, account_id: u32) -> Result<Account> {
        self.get(&format!("/account/{account_id}"), &[]).await
    }

    // --- Market ---

    /// GET /market/{market_id}/orderbook - Orderbook snapshot for a market.
    pub async fn get_orderbook(&self, market_id: u32) -> Result<OrderbookInfo> {
        self.get(&format!("/market/{market_id}/orderbook"), &[])
            .await
    }
}

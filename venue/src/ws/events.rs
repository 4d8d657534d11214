use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::Side;

/// Orderbook entry from the delta stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbookEntry {
    pub price: f64,
    pub size: f64,
}

/// WebSocket delta (orderbook) update message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketDeltaUpdate {
    pub e: String,
    pub last_update_id: u64,
    pub update_id: u64,
    pub market_symbol: String,
    pub asks: Vec<OrderbookEntry>,
    pub bids: Vec<OrderbookEntry>,
    pub timestamp: u64,
}

/// Fill information within an account update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountFill {
    pub side: Side,
    pub quantity: f64,
    pub remaining: f64,
    pub price: f64,
    pub order_id: String,
    pub market_id: u32,
    pub maker_id: u32,
    pub taker_id: u32,
    pub sender_tracking_id: Option<u64>,
}

/// Place information within an account update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountPlace {
    pub side: Side,
    pub current_size: f64,
    pub price: f64,
    pub market_id: u32,
}

/// Cancel information within an account update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountCancel {
    pub side: Side,
    pub current_size: f64,
    pub price: f64,
    pub market_id: u32,
}

/// WebSocket account update message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketAccountUpdate {
    pub last_update_id: u64,
    pub update_id: u64,
    pub account_id: u32,
    pub fills: HashMap<String, AccountFill>,
    pub places: HashMap<String, AccountPlace>,
    pub cancels: HashMap<String, AccountCancel>,
    pub balances: HashMap<String, f64>,
}

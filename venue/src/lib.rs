pub mod account;
pub mod actions;
pub mod client;
pub mod config;
pub mod error;
pub mod orderbook;
pub mod rest;
pub mod types;
pub mod user;
pub mod utils;
pub mod ws;

// ---- Top-level re-exports for ergonomic usage ----

// Client + user
pub use client::Venue;
pub use config::VenueConfig;
pub use error::{Result, VenueError};
pub use user::VenueUser;

// REST client
pub use rest::VenueHttpClient;

// Core enums
pub use types::{FillMode, Side};

// Market + token info
pub use types::{MarketInfo, MarketsInfo, TokenInfo};

// Account types
pub use types::{Account, AccountMarginsView, Balance, OpenOrder, PerpPosition, PositionSummary};

// Orderbook (REST snapshot types)
pub use types::{OrderbookInfo, SideSummary};

// Orderbook (live stream)
pub use orderbook::{MidPrice, OrderbookDepth, OrderbookSide, OrderbookStream, BBO};

// Account stream
pub use account::{AccountStream, FillEvent, TrackedOrder};

// User info
pub use types::{User, UserSession};

// WebSocket events
pub use ws::events::{AccountFill, OrderbookEntry, WebSocketAccountUpdate, WebSocketDeltaUpdate};
